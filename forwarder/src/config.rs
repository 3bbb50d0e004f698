use std::env::var;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Static destination URL. Required unless the destination comes from the message body.
pub const FORWARD_URL: &str = "FORWARD_URL";
/// `static` or `body`
pub const FORWARD_ROUTING: &str = "FORWARD_ROUTING";
/// `body`, `record` or `off`
pub const FORWARD_DEDUP: &str = "FORWARD_DEDUP";
/// `records` or `raw`
pub const FORWARD_INTAKE: &str = "FORWARD_INTAKE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}. Expected one of: {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Where the destination of each forwarded record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Routing {
    /// Every record goes to `FORWARD_URL` as-is.
    #[default]
    Static,
    /// The message body is a JSON object with a `url` field.
    /// The field is removed and the rest of the body is posted to that URL.
    Body,
}

/// What the fingerprint of a record is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintPolicy {
    /// The `body` string only. Redeliveries with different metadata are duplicates.
    #[default]
    Body,
    /// The whole record rendered as JSON with sorted keys.
    Record,
}

/// How the invocation payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intake {
    /// A list of records, bare or wrapped in `{"Records": [...]}`.
    #[default]
    Records,
    /// The payload is forwarded verbatim to `FORWARD_URL` in a single POST.
    Raw,
}

impl FromStr for Routing {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "body" => Ok(Self::Body),
            _ => Err(ConfigError::InvalidValue {
                var: FORWARD_ROUTING,
                value: s.to_owned(),
                expected: "static, body",
            }),
        }
    }
}

impl FromStr for Intake {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "records" => Ok(Self::Records),
            "raw" => Ok(Self::Raw),
            _ => Err(ConfigError::InvalidValue {
                var: FORWARD_INTAKE,
                value: s.to_owned(),
                expected: "records, raw",
            }),
        }
    }
}

/// `off` disables deduplication, hence the Option.
fn parse_dedup(s: &str) -> Result<Option<FingerprintPolicy>, ConfigError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "body" => Ok(Some(FingerprintPolicy::Body)),
        "record" => Ok(Some(FingerprintPolicy::Record)),
        "off" | "none" | "false" => Ok(None),
        _ => Err(ConfigError::InvalidValue {
            var: FORWARD_DEDUP,
            value: s.to_owned(),
            expected: "body, record, off",
        }),
    }
}

impl fmt::Display for Routing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Body => "body",
        })
    }
}

impl fmt::Display for FingerprintPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Body => "body",
            Self::Record => "record",
        })
    }
}

impl fmt::Display for Intake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Records => "records",
            Self::Raw => "raw",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// E.g. https://webhook.example.com/inbound.
    /// Missing URL is not a startup error: invocations that need it fail with a 500 instead.
    pub forward_url: Option<String>,
    pub routing: Routing,
    /// None if deduplication is disabled
    pub dedup: Option<FingerprintPolicy>,
    pub intake: Intake,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forward_url: None,
            routing: Routing::default(),
            dedup: Some(FingerprintPolicy::default()),
            intake: Intake::default(),
        }
    }
}

impl Config {
    /// Creates a new Config instance from the environment variables.
    /// Uses default values where possible.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| var(key).ok())
    }

    /// Same as `from_env`, but reads the values through `lookup`.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let forward_url = lookup(FORWARD_URL).map(|v| v.trim().to_owned());

        let routing = match lookup(FORWARD_ROUTING) {
            Some(v) => v.parse()?,
            None => Routing::default(),
        };

        let dedup = match lookup(FORWARD_DEDUP) {
            Some(v) => parse_dedup(&v)?,
            None => Some(FingerprintPolicy::default()),
        };

        let intake = match lookup(FORWARD_INTAKE) {
            Some(v) => v.parse()?,
            None => Intake::default(),
        };

        Ok(Self {
            forward_url,
            routing,
            dedup,
            intake,
        })
    }

    /// True if invocations cannot proceed without `FORWARD_URL`.
    pub fn needs_forward_url(&self) -> bool {
        self.intake == Intake::Raw || self.routing == Routing::Static
    }

    /// Logs the effective configuration, one line.
    pub fn log_summary(&self) {
        info!(
            forward_url = self.forward_url.as_deref().unwrap_or("<unset>"),
            routing = %self.routing,
            dedup = %self.dedup.map_or_else(|| "off".to_string(), |p| p.to_string()),
            intake = %self.intake,
            "Forwarder config"
        );

        if self.needs_forward_url() && self.forward_url.is_none() {
            warn!("FORWARD_URL env var is not set. Every invocation will fail with 500.");
        }
    }
}

/// Prints all environment variables to the log in the form of `export KEY=VALUE key2=value2`
pub fn print_env_vars() {
    let mut env_vars = Vec::<String>::with_capacity(30);
    env_vars.push(" export".to_string()); // the space at the front keeps EXPORT as the first item after sorting
    for (key, value) in std::env::vars() {
        match key.as_str() {
            "AWS_ACCESS_KEY_ID" | "AWS_SECRET_ACCESS_KEY" | "AWS_SESSION_TOKEN" => {
                // do not log sensitive vars
            }
            _ => {
                env_vars.push(format!("{}={}", key, value));
            }
        }
    }

    env_vars.sort();

    tracing::debug!("{}", env_vars.join(" "));
}
