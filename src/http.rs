//! HTTP JSON backend
//!
//! Fetches JSON documents over HTTP so they can be cached by a
//! `CacheModule`.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::service::Service;

/// Errors that can occur when fetching a JSON document
#[derive(Debug, Error)]
pub enum HttpError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("Server returned status {0}")]
    Status(u16),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// The configured method is not supported by this service
    #[error("Unknown service method: '{0}'. Valid methods: call, get")]
    UnknownMethod(String),
}

/// Parameters for a single JSON fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpRequest {
    /// Absolute URL of the document
    pub url: String,
}

impl HttpRequest {
    /// Creates a request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Service that GETs JSON documents
#[derive(Debug, Clone)]
pub struct HttpJsonService {
    client: Client,
}

impl Default for HttpJsonService {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpJsonService {
    /// Create a new HttpJsonService with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a new HttpJsonService with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Fetch and parse the JSON document at `url`
    ///
    /// # Returns
    /// * `Ok(Value)` - The parsed document
    /// * `Err(HttpError)` - If the request fails, the status is not 2xx, or parsing fails
    pub async fn fetch_json(&self, url: &str) -> Result<Value, HttpError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl Service<HttpRequest> for HttpJsonService {
    type Output = Value;
    type Error = HttpError;

    fn call<'a>(
        &'a self,
        method: &'a str,
        params: &'a HttpRequest,
    ) -> BoxFuture<'a, Result<Value, HttpError>> {
        match method {
            "call" | "get" => self.fetch_json(&params.url).boxed(),
            other => futures::future::ready(Err(HttpError::UnknownMethod(other.to_string()))).boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_method_is_rejected_without_request() {
        let service = HttpJsonService::new();
        let request = HttpRequest::new("http://127.0.0.1:9/never-contacted");

        let err = service.call("post", &request).await.unwrap_err();

        assert!(matches!(err, HttpError::UnknownMethod(ref m) if m == "post"));
        assert!(err.to_string().contains("Valid methods"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_request_failure() {
        let service = HttpJsonService::new();
        // Port 9 (discard) on localhost is closed on typical machines
        let request = HttpRequest::new("http://127.0.0.1:9/");

        let result = service.call("call", &request).await;

        assert!(matches!(result, Err(HttpError::RequestFailed(_))));
    }

    #[test]
    fn test_http_request_new() {
        let request = HttpRequest::new("https://example.com/data.json");
        assert_eq!(request.url, "https://example.com/data.json");
    }
}
