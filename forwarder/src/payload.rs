//! Invocation payload intake and the invocation response.
//!
//! A payload is either a bare list of records or an SQS event object with a `Records` list.
//! Anything else is rejected so the caller can answer with a 400.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const OK_BODY: &str = "Request forwarded successfully";
pub const BAD_REQUEST_BODY: &str = "Bad Request: No Records found in event";

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("payload is neither a list of records nor an object with a Records list")]
    UnrecognizedShape,
}

/// The two admissible shapes of a records payload.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    Bare(Vec<Value>),
    Wrapped {
        #[serde(rename = "Records")]
        records: Vec<Value>,
    },
}

/// A single message from the payload.
/// The fields other than `body` are passed through without being interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct Record(Value);

/// Result of looking up `body` in a record.
#[derive(Debug, PartialEq, Eq)]
pub enum Body<'a> {
    Text(&'a str),
    Missing,
    NotText,
}

impl Record {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Non-object records have no body.
    pub fn body(&self) -> Body<'_> {
        match self.0.get("body") {
            Some(Value::String(body)) => Body::Text(body),
            Some(_) => Body::NotText,
            None => Body::Missing,
        }
    }

    /// The record exactly as it arrived.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Optional SQS message ID, used in log lines only.
    pub fn message_id(&self) -> Option<&str> {
        self.0.get("messageId").and_then(Value::as_str)
    }
}

/// Normalizes an already decoded payload into an ordered list of records.
pub fn parse_records(payload: Value) -> Result<Vec<Record>, PayloadError> {
    let envelope: Envelope = serde_json::from_value(payload).map_err(|_| PayloadError::UnrecognizedShape)?;

    let records = match envelope {
        Envelope::Bare(records) => records,
        Envelope::Wrapped { records } => records,
    };

    Ok(records.into_iter().map(Record::new).collect())
}

/// Same as `parse_records`, but starts from the raw bytes, e.g. a payload file.
pub fn parse_records_slice(payload: &[u8]) -> Result<Vec<Record>, PayloadError> {
    let payload: Value = serde_json::from_slice(payload).map_err(PayloadError::NotJson)?;
    parse_records(payload)
}

/// The complete response contract of an invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok() -> Self {
        Self {
            status_code: 200,
            body: OK_BODY.to_string(),
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status_code: 400,
            body: BAD_REQUEST_BODY.to_string(),
        }
    }

    pub fn server_error(reason: &str) -> Self {
        Self {
            status_code: 500,
            body: format!("Server Error: {reason}"),
        }
    }
}
