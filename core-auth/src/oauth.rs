//! Authorization code flow with PKCE (RFC 7636) for cloud import sources.
//!
//! [`OAuthFlowManager`] only talks to the provider's endpoints. Where tokens
//! live, and when they are refreshed, is up to
//! [`OAuthSession`](crate::session::OAuthSession).
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig::google_drive(
//!     "client-id.apps.googleusercontent.com",
//!     None,
//!     "http://127.0.0.1:8765/callback",
//! );
//!
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//! let (auth_url, pkce_verifier) = flow_manager.build_auth_url()?;
//! // Open auth_url in the browser, keep pkce_verifier for the callback
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Read-only Drive scope; imports never write to the user's Drive.
pub const GOOGLE_DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// OAuth 2.0 provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Provider name used in logs and auth events (e.g. "GoogleDrive")
    pub provider: String,
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (optional for public clients)
    pub client_secret: Option<String>,
    /// Redirect URI for OAuth callback
    pub redirect_uri: String,
    /// List of OAuth scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for Google's installed-app flow with read-only Drive access.
    pub fn google_drive(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            provider: "GoogleDrive".to_string(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes: vec![
                GOOGLE_DRIVE_READONLY_SCOPE.to_string(),
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// Secret half of a PKCE exchange plus the CSRF `state` sent with it.
///
/// Only [`challenge`](Self::challenge) goes to the authorization server; the
/// verifier itself is sent once, with the code, to the token endpoint.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();
        let mut random_token = |len: usize| {
            let mut bytes = vec![0u8; len];
            rng.fill(bytes.as_mut_slice());
            URL_SAFE_NO_PAD.encode(bytes)
        };

        // 32 bytes encode to 43 characters, the RFC minimum
        let verifier = random_token(32);
        let state = random_token(16);
        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// `S256` challenge: unpadded base64url of SHA-256 over the verifier.
    pub fn challenge(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(self.verifier.as_bytes()))
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Retries for 5xx responses from the token endpoint during refresh.
const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// OAuth 2.0 flow manager.
///
/// Drives the authorization code flow with PKCE for one provider.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Provider name from the configuration.
    pub fn provider(&self) -> &str {
        &self.config.provider
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns the URL to open in the browser and the verifier that must be
    /// kept until the callback arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured authorization URL cannot be parsed.
    #[instrument(skip(self), fields(provider = %self.config.provider))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256")
            // offline access yields a refresh token
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent");

        debug!("Built authorization URL");
        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for OAuth tokens.
    ///
    /// # Errors
    ///
    /// - `StateMismatch` if the callback state differs from the verifier's
    /// - `InvalidAuthCode` if the token endpoint rejects the code
    /// - `NetworkError` if the request could not be sent
    #[instrument(skip(self, code, state, verifier), fields(provider = %self.config.provider))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch, rejecting callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", verifier.verifier()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self
            .post_form(&params)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let detail = error_detail(&response);
            warn!(status = response.status, error = %detail, "Authorization code rejected");
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                response.status, detail
            )));
        }

        let token_response = parse_token_response(&response)?;
        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for tokens"
        );

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    /// Refresh an access token.
    ///
    /// 4xx responses fail immediately; 5xx responses are retried with
    /// exponential backoff. The old refresh token is kept when the provider
    /// does not rotate it.
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let response = self
                .post_form(&params)
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response = parse_token_response(&response)?;
                info!(
                    expires_in = token_response.expires_in,
                    "Refreshed access token"
                );
                return Ok(OAuthTokens::new(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .or_else(|| Some(refresh_token.to_string())),
                    token_response.expires_in,
                ));
            }

            let detail = error_detail(&response);
            if response.is_client_error() || attempt >= MAX_REFRESH_ATTEMPTS {
                warn!(status = response.status, attempt, error = %detail, "Token refresh failed");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {} after {} attempt(s): {}",
                    response.status, attempt, detail
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempt - 1));
            warn!(
                status = response.status,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    async fn post_form(
        &self,
        params: &[(&str, &str)],
    ) -> bridge_traits::error::Result<bridge_traits::HttpResponse> {
        let encoded = serde_urlencoded::to_string(params).map_err(|e| {
            bridge_traits::BridgeError::OperationFailed(format!(
                "Failed to encode token request: {}",
                e
            ))
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .form(encoded);

        self.http_client.execute(request).await
    }
}

fn parse_token_response(response: &bridge_traits::HttpResponse) -> Result<TokenResponse> {
    response
        .json()
        .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))
}

fn error_detail(response: &bridge_traits::HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            provider: "GoogleDrive".to_string(),
            client_id: "test-client".to_string(),
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8765/callback".to_string(),
            scopes: vec!["scope1".to_string(), "scope2".to_string()],
            auth_url: "https://provider.example/auth".to_string(),
            token_url: "https://provider.example/token".to_string(),
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();
        assert!(verifier.verifier().len() >= 43);
        assert!(!verifier.state().is_empty());
        assert_eq!(verifier.challenge(), verifier.challenge());

        let other = PkceVerifier::new();
        assert_ne!(verifier.verifier(), other.verifier());
        assert_ne!(verifier.state(), other.state());
    }

    #[test]
    fn test_pkce_challenge_known_vector() {
        // RFC 7636 appendix B
        let verifier = PkceVerifier {
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
            state: "state".to_string(),
        };
        assert_eq!(
            verifier.challenge(),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_pkce_debug_redacts_verifier() {
        let verifier = PkceVerifier::new();
        let rendered = format!("{:?}", verifier);
        assert!(!rendered.contains(verifier.verifier()));
    }

    #[test]
    fn test_google_drive_config() {
        let config = OAuthConfig::google_drive("id", None, "http://127.0.0.1/cb");
        assert_eq!(config.provider, "GoogleDrive");
        assert!(config
            .scopes
            .contains(&GOOGLE_DRIVE_READONLY_SCOPE.to_string()));
        assert!(config.token_url.starts_with("https://oauth2.googleapis.com"));
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(test_config(), Arc::new(MockHttp::new()));
        let (url, verifier) = manager.build_auth_url().unwrap();

        assert!(url.starts_with("https://provider.example/auth?"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=scope1+scope2") || url.contains("scope=scope1%20scope2"));
        assert!(url.contains(&format!("state={}", verifier.state())));
        assert!(url.contains(&format!("code_challenge={}", verifier.challenge())));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut config = test_config();
        config.auth_url = "not a valid url".to_string();
        let manager = OAuthFlowManager::new(config, Arc::new(MockHttp::new()));

        assert!(matches!(manager.build_auth_url(), Err(AuthError::Other(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_rejects_state_mismatch() {
        let mut http = MockHttp::new();
        http.expect_execute().never();
        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();

        let result = manager.exchange_code("code", "forged", &verifier).await;
        assert!(matches!(result, Err(AuthError::StateMismatch { .. })));
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|request| {
                let body = request
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).to_string())
                    .unwrap_or_default();
                request.method == HttpMethod::Post
                    && request.url == "https://provider.example/token"
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code=auth-code")
                    && body.contains("code_verifier=")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"ya29.token","refresh_token":"1//refresh","expires_in":1800}"#,
                ))
            });

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();
        let state = verifier.state().to_string();

        let tokens = manager
            .exchange_code("auth-code", &state, &verifier)
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "ya29.token");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert!(!tokens.expires_within(0));
    }

    #[tokio::test]
    async fn test_exchange_code_invalid_grant() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();
        let state = verifier.state().to_string();

        let result = manager.exchange_code("stale", &state, &verifier).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthCode(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_network_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("offline".to_string())));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();
        let state = verifier.state().to_string();

        let result = manager.exchange_code("code", &state, &verifier).await;
        assert!(matches!(result, Err(AuthError::NetworkError(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(503, "unavailable")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"fresh"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let tokens = manager.refresh_access_token("1//keep").await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//keep"));
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_not_retried() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(401, r#"{"error":"invalid_client"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.refresh_access_token("revoked").await;

        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"token"}"#).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
