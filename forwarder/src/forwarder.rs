use crate::config::{Config, Intake, Routing};
use crate::dedup::{fingerprint, DedupSet};
use crate::payload::{parse_records, parse_records_slice, Body, InvocationResponse, PayloadError, Record};
use crate::transport::Transport;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a record was not sent anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingBody,
    NonTextBody,
    Duplicate { fingerprint: String },
    /// The body had to be JSON to find the destination, but it was not
    MalformedBody(String),
    MissingUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBody => write!(f, "missing 'body'"),
            Self::NonTextBody => write!(f, "'body' is not a string"),
            Self::Duplicate { fingerprint } => write!(f, "duplicate message {fingerprint}"),
            Self::MalformedBody(e) => write!(f, "'body' is not valid JSON: {e}"),
            Self::MissingUrl => write!(f, "no 'url' string in body"),
        }
    }
}

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Sent and got a response back. Any HTTP status counts.
    Forwarded { url: String, status: u16 },
    Skipped(SkipReason),
    /// The request could not be sent or got no response.
    Failed { url: String, error: String },
}

/// Everything one invocation did: the response for the runtime plus per-record outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub response: InvocationResponse,
    /// In payload order, one per record
    pub outcomes: Vec<Outcome>,
}

impl Report {
    fn rejected(response: InvocationResponse) -> Self {
        Self {
            response,
            outcomes: Vec::new(),
        }
    }

    pub fn forwarded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Forwarded { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, Outcome::Skipped(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o, Outcome::Failed { .. })).count()
    }
}

/// Destination of the records of one invocation, resolved before any record is touched.
enum Target<'a> {
    Static(&'a str),
    FromBody,
}

/// Forwards the records of each invocation to their destination.
/// One instance lives for the whole process and serves all invocations.
pub struct Forwarder<T> {
    config: Config,
    transport: T,
    seen: Arc<DedupSet>,
}

impl<T: Transport> Forwarder<T> {
    pub fn new(config: Config, transport: T, seen: Arc<DedupSet>) -> Self {
        Self {
            config,
            transport,
            seen,
        }
    }

    pub fn dedup_set(&self) -> &DedupSet {
        &self.seen
    }

    /// Handles an invocation payload already decoded by the runtime.
    pub async fn handle_event(&self, event: Value) -> Report {
        info!("Event: {}", event);

        match self.config.intake {
            Intake::Raw => match serde_json::to_vec(&event) {
                Ok(bytes) => self.forward_raw(bytes).await,
                Err(e) => {
                    error!("Failed to serialize the event: {}", e);
                    Report::rejected(InvocationResponse::bad_request())
                }
            },
            Intake::Records => self.forward_batch(parse_records(event)).await,
        }
    }

    /// Handles an invocation payload as raw bytes, e.g. read from a file.
    pub async fn handle_bytes(&self, payload: &[u8]) -> Report {
        info!("Event: {}", String::from_utf8_lossy(payload));

        match self.config.intake {
            Intake::Raw => self.forward_raw(payload.to_vec()).await,
            Intake::Records => self.forward_batch(parse_records_slice(payload)).await,
        }
    }

    /// Returns the static URL or a 500 response if it is required and missing.
    fn static_url(&self) -> Result<&str, InvocationResponse> {
        match self.config.forward_url.as_deref() {
            Some(url) => Ok(url),
            None => {
                error!("FORWARD_URL env var is not set. No messages are forwarded.");
                Err(InvocationResponse::server_error("FORWARD_URL is not configured"))
            }
        }
    }

    /// Sends the payload as-is in a single POST.
    async fn forward_raw(&self, payload: Vec<u8>) -> Report {
        let url = match self.static_url() {
            Ok(v) => v,
            Err(response) => return Report::rejected(response),
        };

        let outcome = self.send(url, payload).await;

        Report {
            response: InvocationResponse::ok(),
            outcomes: vec![outcome],
        }
    }

    async fn forward_batch(&self, records: Result<Vec<Record>, PayloadError>) -> Report {
        // a missing destination fails the invocation before the payload is even looked at
        let target = match self.config.routing {
            Routing::Static => match self.static_url() {
                Ok(url) => Target::Static(url),
                Err(response) => return Report::rejected(response),
            },
            Routing::Body => Target::FromBody,
        };

        let records = match records {
            Ok(v) => v,
            Err(e) => {
                warn!("Bad Request: {}", e);
                return Report::rejected(InvocationResponse::bad_request());
            }
        };

        debug!("Processing {} records", records.len());

        let mut outcomes = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            let outcome = self.forward_record(&target, record).await;

            if let Outcome::Skipped(reason) = &outcome {
                let message_id = record.message_id().unwrap_or_default();
                match reason {
                    SkipReason::Duplicate { .. } => {
                        info!(idx, message_id, "Duplicate message detected: {}", record.as_value())
                    }
                    _ => warn!(idx, message_id, "Skipping record ({}): {}", reason, record.as_value()),
                }
            }

            outcomes.push(outcome);
        }

        let report = Report {
            response: InvocationResponse::ok(),
            outcomes,
        };

        info!(
            forwarded = report.forwarded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Invocation complete"
        );

        report
    }

    /// Takes a single record through dedup, routing and sending.
    async fn forward_record(&self, target: &Target<'_>, record: &Record) -> Outcome {
        let body = match record.body() {
            Body::Text(v) => v,
            Body::Missing => return Outcome::Skipped(SkipReason::MissingBody),
            Body::NotText => return Outcome::Skipped(SkipReason::NonTextBody),
        };

        // the fingerprint goes in before the POST, so a slow destination cannot let a copy through
        if let Some(policy) = self.config.dedup {
            let fingerprint = fingerprint(policy, record, body);
            if !self.seen.insert(&fingerprint) {
                return Outcome::Skipped(SkipReason::Duplicate { fingerprint });
            }
        }

        let serialized = match target {
            Target::Static(url) => serde_json::to_vec(record.as_value()).map(|v| (url.to_string(), v)),
            Target::FromBody => match extract_url(body) {
                Ok((url, stripped)) => serde_json::to_vec(&stripped).map(|v| (url, v)),
                Err(reason) => return Outcome::Skipped(reason),
            },
        };

        match serialized {
            Ok((url, payload)) => self.send(&url, payload).await,
            Err(e) => Outcome::Failed {
                url: match target {
                    Target::Static(url) => url.to_string(),
                    Target::FromBody => String::new(),
                },
                error: format!("Failed to serialize the record: {e}"),
            },
        }
    }

    async fn send(&self, url: &str, payload: Vec<u8>) -> Outcome {
        match self.transport.post_json(url, payload).await {
            Ok(delivery) => {
                info!(url, status = delivery.status, "Status Code: {}", delivery.status);
                info!(url, "Response Body: {}", delivery.body.as_deref().unwrap_or_default());
                Outcome::Forwarded {
                    url: url.to_owned(),
                    status: delivery.status,
                }
            }
            Err(e) => {
                warn!(url, "Request Exception: {}", e.message);
                Outcome::Failed {
                    url: url.to_owned(),
                    error: e.message,
                }
            }
        }
    }
}

/// Pulls the destination out of a JSON body and returns it with the rest of the body.
/// The destination must not see its own URL echoed back, so `url` is removed.
fn extract_url(body: &str) -> Result<(String, Value), SkipReason> {
    let mut parsed: Value = serde_json::from_str(body).map_err(|e| SkipReason::MalformedBody(e.to_string()))?;

    let Some(fields) = parsed.as_object_mut() else {
        return Err(SkipReason::MissingUrl);
    };

    match fields.remove("url") {
        Some(Value::String(url)) if !url.trim().is_empty() => Ok((url, parsed)),
        _ => Err(SkipReason::MissingUrl),
    }
}
