//! Request dispatch
//!
//! [`Transport`] is the seam between the batch loop and the network. The
//! orchestrator owns cancellation: it races every `send` against the batch
//! token and drops the future on stop, which aborts an in-flight request.

use std::time::Duration;

use async_trait::async_trait;

/// Message recorded for jobs that could not reach the endpoint.
pub const CONNECT_FAILURE_MESSAGE: &str = "Could not connect (network error or request blocked)";

/// Fully built request for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Status code and full body text of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// POST the request and return the response, whatever its status.
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// HTTP transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let mut req = self.client.post(&request.url);
        for (k, v) in &request.headers {
            req = req.header(k, v);
        }

        let resp = req.body(request.body.clone()).send().await?;
        let status = resp.status().as_u16();
        // An unreadable body classifies the same as an empty one.
        let body = resp.text().await.unwrap_or_default();

        Ok(RawResponse { status, body })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("request cancelled")]
    Cancelled,
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl TransportError {
    /// Message written into the failed job record.
    #[must_use]
    pub fn record_message(&self) -> String {
        match self {
            Self::Connect(_) => CONNECT_FAILURE_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}
