//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse},
};
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const USER_AGENT: &str = "studio-core/0.1.0";

/// Reqwest-based HTTP client implementation
///
/// Pools connections per host and verifies TLS with rustls. Each
/// [`execute`](HttpClient::execute) is a single attempt.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a new HTTP client with a custom overall request timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client configuration");
                Client::new()
            });

        Self { client }
    }

    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    fn build_request(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(Self::convert_method(request.method), &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Read the body chunk by chunk, failing once it exceeds `limit`.
    async fn read_body(mut response: reqwest::Response, limit: Option<u64>) -> Result<Bytes> {
        let limit = match limit {
            Some(limit) => limit,
            None => return response.bytes().await.map_err(transport_error),
        };

        if response.content_length().is_some_and(|len| len > limit) {
            return Err(too_large(limit));
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if body.len() as u64 + chunk.len() as u64 > limit {
                return Err(too_large(limit));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    if e.is_timeout() {
        BridgeError::OperationFailed("Request timed out".to_string())
    } else if e.is_connect() {
        BridgeError::OperationFailed(format!("Connection failed: {}", e))
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

fn too_large(limit: u64) -> BridgeError {
    BridgeError::OperationFailed(format!("Response body exceeds {} bytes", limit))
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[instrument(skip(self, request), fields(method = ?request.method))]
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.build_request(&request).send().await.map_err(|e| {
            warn!(error = %e, "HTTP request failed");
            transport_error(e)
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        let body = Self::read_body(response, request.max_body_bytes).await?;
        debug!(status, bytes = body.len(), "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_carries_headers() {
        let client = ReqwestHttpClient::new();
        let request = HttpRequest::new(HttpMethod::Get, "https://example.com/image.png")
            .bearer_token("secret")
            .timeout(Duration::from_secs(5));

        let built = client.build_request(&request).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::GET);
        assert_eq!(
            built.headers().get("Authorization").unwrap(),
            "Bearer secret"
        );
        assert_eq!(built.timeout(), Some(&Duration::from_secs(5)));
    }

    #[test]
    fn test_build_request_carries_body() {
        let client = ReqwestHttpClient::new();
        let request =
            HttpRequest::new(HttpMethod::Post, "https://example.com/token").form("code=abc");

        let built = client.build_request(&request).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(
            built.body().and_then(|b| b.as_bytes()),
            Some(&b"code=abc"[..])
        );
    }

    #[test]
    fn test_method_conversion() {
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Head),
            reqwest::Method::HEAD
        );
        assert_eq!(
            ReqwestHttpClient::convert_method(HttpMethod::Post),
            reqwest::Method::POST
        );
    }

    #[test]
    fn test_too_large_message() {
        assert_eq!(
            too_large(10).to_string(),
            "Bridge operation failed: Response body exceeds 10 bytes"
        );
    }
}
