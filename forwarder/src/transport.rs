use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, warn};

/// A request that never got a response, e.g. DNS, connection or TLS failure.
/// Non-success HTTP statuses are not transport errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("POST {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// What came back from the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub status: u16,
    /// None if the response body could not be read
    pub body: Option<String>,
}

/// Sends a JSON document to a URL with a POST.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Delivery, TransportError>;
}

/// The production transport. No retries, no custom timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: Vec<u8>) -> Result<Delivery, TransportError> {
        debug!(url, bytes = body.len(), "Sending");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError {
                url: url.to_owned(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();

        // text() consumes the response, so it is released whether the read succeeds or not
        let body = match response.text().await {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(url, status, "Failed to read the response body: {}", e);
                None
            }
        };

        Ok(Delivery { status, body })
    }
}
