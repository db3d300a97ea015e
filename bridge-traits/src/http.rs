//! HTTP Client Abstraction
//!
//! Single-attempt async HTTP with bearer tokens, per-request timeouts and body limits.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

/// Methods the import core issues. Imports are read-only, so only token
/// exchange ever posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

/// Outgoing request, built fluently
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    /// Abort once the response body grows past this many bytes
    pub max_body_bytes: Option<u64>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
            max_body_bytes: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    /// `application/x-www-form-urlencoded` body, already encoded.
    pub fn form(self, encoded: impl Into<String>) -> Self {
        self.header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded.into()))
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    pub fn max_body_bytes(mut self, limit: u64) -> Self {
        self.max_body_bytes = Some(limit);
        self
    }
}

/// Response as delivered by the host, body fully buffered
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Look up a header case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Host HTTP stack.
///
/// One call is one attempt. Callers that talk to rate-limited APIs (the Drive
/// connector, the OAuth token endpoint) own their retry and backoff.
///
/// Non-2xx statuses come back as responses, not errors. Transport failures
/// (DNS, TLS, timeouts, oversized bodies) are `BridgeError::OperationFailed`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_request_builder() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .header("User-Agent", "test")
            .bearer_token("secret")
            .timeout(Duration::from_secs(30));

        assert_eq!(request.url, "https://example.com");
        assert_eq!(request.headers.get("User-Agent"), Some(&"test".to_string()));
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer secret".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_form_body_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://oauth2.example/token")
            .form("grant_type=refresh_token&refresh_token=abc");

        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            request.body.as_deref(),
            Some(&b"grant_type=refresh_token&refresh_token=abc"[..])
        );
    }

    #[test]
    fn test_http_response_status_checks() {
        let status = |status| HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        };

        assert!(status(206).is_success());
        assert!(status(429).is_client_error());
        assert!(status(503).is_server_error());
        assert!(!status(304).is_success());
    }

    #[test]
    fn test_http_response_header_lookup_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "image/png".to_string());
        let response = HttpResponse {
            status: 200,
            headers,
            body: Bytes::new(),
        };

        assert_eq!(response.header("Content-Type"), Some("image/png"));
        assert_eq!(response.header("X-Missing"), None);
    }

    #[test]
    fn test_body_limit_is_opt_in() {
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com/a.png");
        assert_eq!(request.max_body_bytes, None);
        assert_eq!(request.max_body_bytes(1024).max_body_bytes, Some(1024));
    }
}
