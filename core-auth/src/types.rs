use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Access and refresh token pair for one provider account.
///
/// `Debug` never prints either token.
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("ya29.a0...".to_string(), Some("1//0g...".to_string()), 3600);
/// assert!(!tokens.expires_within(300));
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Absent when the provider did not grant offline access
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Tokens that expire `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self::issued_at(Utc::now(), access_token, refresh_token, expires_in)
    }

    pub fn issued_at(
        issued_at: DateTime<Utc>,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at + Duration::seconds(expires_in),
        }
    }

    /// True when the access token is expired, or will be within `seconds`.
    pub fn expires_within(&self, seconds: i64) -> bool {
        Utc::now() + Duration::seconds(seconds) >= self.expires_at
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("has_refresh_token", &self.can_refresh())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where a provider account is in the consent lifecycle.
///
/// ```text
/// SignedOut -> SigningIn -> SignedIn <-> TokenRefreshing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    SignedOut,
    /// Consent URL handed out, waiting for the callback
    SigningIn,
    SignedIn,
    TokenRefreshing,
}

impl AuthState {
    /// Whether connectors can expect a bearer token.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn | AuthState::TokenRefreshing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::SignedOut => "signed_out",
            AuthState::SigningIn => "signing_in",
            AuthState::SignedIn => "signed_in",
            AuthState::TokenRefreshing => "token_refreshing",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
