//! HTTP transport for action delivery.

use async_trait::async_trait;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Raw response of one POST.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    /// Statuses below 400 are not errors.
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport has been shut down")]
    Closed,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}

/// Something that can POST a JSON payload to a path on the destination host.
///
/// Implementations must be safe for concurrent use by many in-flight
/// requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;

    /// Release pooled connections. Callers drain in-flight requests first.
    async fn shutdown(&self) {}
}

/// reqwest-backed transport holding one pooled client for all requests.
pub struct HttpTransport {
    base_url: String,
    client: RwLock<Option<reqwest::Client>>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: RwLock::new(Some(client)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn client(&self) -> Result<reqwest::Client, TransportError> {
        let guard = self
            .client
            .read()
            .map_err(|e| TransportError::Client(format!("Failed to acquire lock: {}", e)))?;
        guard.clone().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client()?;
        let url = format!("{}{}", self.base_url, path);

        let resp = client.post(&url).json(payload).send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            TransportError::Network(format!("Failed to read response body from {}: {}", url, e))
        })?;

        Ok(TransportResponse { status, body })
    }

    async fn shutdown(&self) {
        match self.client.write() {
            Ok(mut guard) => {
                guard.take();
                tracing::debug!(base_url = %self.base_url, "HTTP transport shut down");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to shut down HTTP transport"),
        }
    }
}
