use crate::config::FingerprintPolicy;
use crate::payload::Record;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::error;

/// Number of leading SHA-256 bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Returns a short hex digest of the record content selected by `policy`.
/// `body` is the record's already extracted body text.
pub fn fingerprint(policy: FingerprintPolicy, record: &Record, body: &str) -> String {
    let mut hasher = Sha256::new();
    match policy {
        FingerprintPolicy::Body => hasher.update(body.as_bytes()),
        FingerprintPolicy::Record => hasher.update(sorted_keys(record.as_value()).to_string().as_bytes()),
    }
    hex::encode(&hasher.finalize()[..FINGERPRINT_BYTES])
}

/// A copy of `value` with the keys of every object in sorted order.
fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

/// Fingerprints of the records seen during the lifetime of this process.
/// Nothing is ever removed. It is shared between invocations, hence the mutex.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: Mutex<HashSet<String>>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the fingerprint and returns true if it was not there before.
    /// The check and the insert happen under one lock so two concurrent callers
    /// cannot both see the same fingerprint as new.
    pub fn insert(&self, fingerprint: &str) -> bool {
        match self.seen.lock() {
            Ok(mut seen) => seen.insert(fingerprint.to_owned()),
            Err(poisoned) => {
                error!("DedupSet mutex is poisoned. It's a bug");
                poisoned.into_inner().insert(fingerprint.to_owned())
            }
        }
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        match self.seen.lock() {
            Ok(seen) => seen.contains(fingerprint),
            Err(poisoned) => poisoned.into_inner().contains(fingerprint),
        }
    }

    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
