//! Forwards SQS message batches to an HTTP endpoint.
//!
//! Each invocation payload is normalized into records, deduplicated by fingerprint
//! against everything seen by this process, and POSTed one by one to either a static
//! URL or a URL carried in the message body. Per-record failures never fail the invocation.

pub mod config;
pub mod dedup;
pub mod forwarder;
pub mod logging;
pub mod payload;
pub mod transport;

pub use config::{Config, ConfigError, FingerprintPolicy, Intake, Routing};
pub use dedup::DedupSet;
pub use forwarder::{Forwarder, Outcome, Report, SkipReason};
pub use payload::{InvocationResponse, Record};
pub use transport::{Delivery, ReqwestTransport, Transport, TransportError};
