use std::env::var;
use tracing_subscriber::EnvFilter;

/// `compact` or `json`
pub const FORWARD_LOG_FORMAT: &str = "FORWARD_LOG_FORMAT";

/// Used when RUST_LOG is not set: INFO for the forwarder binaries, WARN for everything else.
const DEFAULT_FILTER: &str = "warn,sqs_forwarder=info,forwarder_lambda=info,forward_local=info";

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging.
/// No colours and no timestamps because CloudWatch adds its own.
/// Set FORWARD_LOG_FORMAT=json for one JSON object per line.
pub fn init_tracing() {
    let filter = match var(EnvFilter::DEFAULT_ENV) {
        Ok(v) => EnvFilter::builder().parse_lossy(v),
        Err(_) => EnvFilter::builder().parse_lossy(DEFAULT_FILTER),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .without_time();

    match var(FORWARD_LOG_FORMAT).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.compact().init(),
    }
}
