use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel request timed out")]
    Timeout,
    #[error("no connectivity: {details}")]
    NoConnectivity { details: String },
    #[error("channel endpoint rate limited the request")]
    RateLimited,
    #[error("channel fetch failed with HTTP {status}{body_snippet}")]
    HttpStatus { status: u16, body_snippet: String },
    #[error("channel request failed: {details}")]
    Request { details: String },
    #[error("failed to read channel document: {details}")]
    Parse { details: String },
}

/// Fetch-a-JSON-document capability. The SDK does not care about headers,
/// auth, or retries beyond receiving the parsed document; callers retry on
/// their own schedule.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_channel_document(
        &self,
        url: &str,
    ) -> Result<serde_json::Value, TransportError>;
}

/// Default HTTP transport with a bounded per-request timeout. Dropping the
/// in-flight future cancels the request.
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with its own HTTP client.
    ///
    /// # Errors
    /// Returns an error when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Request {
                details: error.to_string(),
            })?;
        Ok(Self { client, timeout })
    }

    /// Build a transport around an existing HTTP client, for embedders that
    /// pool connections across subsystems.
    #[must_use]
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_channel_document(
        &self,
        url: &str,
    ) -> Result<serde_json::Value, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimited);
        }
        if !status.is_success() {
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, 160))
                .unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body_snippet,
            });
        }

        response
            .json()
            .await
            .map_err(|error| TransportError::Parse {
                details: error.to_string(),
            })
    }
}

fn map_request_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::NoConnectivity {
            details: error.to_string(),
        }
    } else {
        TransportError::Request {
            details: error.to_string(),
        }
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
