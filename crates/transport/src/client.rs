//! Reqwest-based implementation of the core `Transport` trait.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;

use receiptwise_core::transport::{HttpMethod, Transport, TransportError};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error body shape the receipts backend returns for failed requests.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// HTTP transport against the receipts backend.
///
/// Failures surface as [`TransportError`]; the sync engine's retry accounting
/// and the router's online-error boundary both rely on that.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given API base URL
    /// (e.g. `http://localhost:3000/api`).
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    fn api_error(status: u16, body: &str) -> TransportError {
        if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
            return TransportError::api(status, parsed.error);
        }
        TransportError::api(status, format!("Request failed: {body}"))
    }

    /// Decode a response body, tolerating empty bodies (e.g. 204 on DELETE).
    fn parse_body(status: u16, body: &str) -> Result<Value, TransportError> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body).map_err(|e| {
            TransportError::InvalidResponse(format!("bad JSON body (status {status}): {e}"))
        })
    }

    async fn handle_response(response: reqwest::Response) -> Result<Value, TransportError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Self::log_response(status, &body);

        if !status.is_success() {
            return Err(Self::api_error(status.as_u16(), &body));
        }
        Self::parse_body(status.as_u16(), &body)
    }
}

fn map_send_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<&Value>,
    ) -> Result<Value, TransportError> {
        let url = self.url(endpoint);
        debug!("{} {}", method, url);

        let mut builder = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        if let Some(body) = payload {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_send_error)?;
        Self::handle_response(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_join_normalizes_slashes() {
        let transport = HttpTransport::new("http://localhost:3000/api/");
        assert_eq!(
            transport.url("/receipts?limit=5"),
            "http://localhost:3000/api/receipts?limit=5"
        );
        assert_eq!(transport.url("receipts"), "http://localhost:3000/api/receipts");
    }

    #[test]
    fn api_error_prefers_backend_error_field() {
        let err = HttpTransport::api_error(404, r#"{"error": "Receipt not found"}"#);
        match err {
            TransportError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Receipt not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_raw_body() {
        let err = HttpTransport::api_error(502, "Bad Gateway");
        assert_eq!(err.status_code(), Some(502));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn empty_body_decodes_to_null() {
        assert_eq!(HttpTransport::parse_body(204, "").expect("parse"), Value::Null);
        assert_eq!(
            HttpTransport::parse_body(200, r#"{"ok": true}"#).expect("parse"),
            json!({"ok": true})
        );
        assert!(HttpTransport::parse_body(200, "not json").is_err());
    }
}
