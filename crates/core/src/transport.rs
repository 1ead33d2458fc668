//! HTTP transport contract consumed by the router and the sync engine.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// HTTP verbs the sync subsystem issues against the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by a [`Transport`] implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection-level failure (DNS, refused, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The request exceeded the transport's own timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status from the remote API.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl TransportError {
    /// Create an API error from status and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Abstract HTTP capability. Failures surface as `Err`, never as sentinel
/// values, so the engine's retry accounting sees every failed replay.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one HTTP call against a logical resource path.
    ///
    /// `payload` is sent as the JSON body for POST/PUT and ignored for
    /// GET/DELETE implementations that have no use for it.
    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> std::result::Result<Value, TransportError>;
}
