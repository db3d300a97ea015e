//! # OAuth Session
//!
//! Holds the credentials of one connected cloud account and keeps them fresh.
//!
//! The host drives the consent step:
//!
//! 1. [`OAuthSession::begin_sign_in`] returns the URL to open in a browser.
//! 2. The loopback callback hands `code` and `state` to
//!    [`OAuthSession::complete_sign_in`].
//! 3. Connectors call [`TokenProvider::access_token`], which refreshes the
//!    token when it is about to expire.
//!
//! Every transition is published on the core event bus as an [`AuthEvent`].

use async_trait::async_trait;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthFlowManager, PkceVerifier};
use crate::provider::TokenProvider;
use crate::types::{AuthState, OAuthTokens};

/// Default timeout for the code exchange (2 minutes)
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Refresh tokens this many seconds before they expire
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Credentials and consent state for a single provider account.
pub struct OAuthSession {
    flow: OAuthFlowManager,
    event_bus: EventBus,
    pending: Mutex<Option<PkceVerifier>>,
    tokens: RwLock<Option<OAuthTokens>>,
    state: RwLock<AuthState>,
    refresh_lock: Mutex<()>,
}

impl OAuthSession {
    pub fn new(flow: OAuthFlowManager, event_bus: EventBus) -> Self {
        Self {
            flow,
            event_bus,
            pending: Mutex::new(None),
            tokens: RwLock::new(None),
            state: RwLock::new(AuthState::SignedOut),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current authentication state.
    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    /// Starts the consent flow and returns the authorization URL.
    ///
    /// # Errors
    ///
    /// `SignInInProgress` if a previous flow has not completed or been cancelled.
    #[instrument(skip(self), fields(provider = %self.flow.provider()))]
    pub async fn begin_sign_in(&self) -> Result<String> {
        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            warn!("Sign-in already in progress");
            return Err(AuthError::SignInInProgress {
                provider: self.flow.provider().to_string(),
            });
        }

        let (auth_url, verifier) = self.flow.build_auth_url()?;
        *pending = Some(verifier);
        drop(pending);

        *self.state.write().await = AuthState::SigningIn;
        self.emit(AuthEvent::SigningIn {
            provider: self.flow.provider().to_string(),
        });

        info!("Sign-in flow initiated");
        Ok(auth_url)
    }

    /// Completes the consent flow with the callback parameters.
    #[instrument(skip(self, code, state), fields(provider = %self.flow.provider()))]
    pub async fn complete_sign_in(&self, code: &str, state: &str) -> Result<()> {
        let verifier = self.pending.lock().await.take().ok_or_else(|| {
            warn!("No sign-in in progress");
            AuthError::NoSignInInProgress {
                provider: self.flow.provider().to_string(),
            }
        })?;

        let outcome = match timeout(
            DEFAULT_AUTH_TIMEOUT,
            self.flow.exchange_code(code, state, &verifier),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AuthError::OperationTimeout {
                operation: "token exchange".to_string(),
            }),
        };

        match outcome {
            Ok(tokens) => {
                self.store(tokens).await;
                self.emit(AuthEvent::SignedIn {
                    provider: self.flow.provider().to_string(),
                    account: None,
                });
                info!("Sign-in completed");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Sign-in failed");
                *self.state.write().await = AuthState::SignedOut;
                self.emit(AuthEvent::AuthError {
                    provider: self.flow.provider().to_string(),
                    message: err.to_string(),
                    recoverable: err.is_recoverable(),
                });
                Err(err)
            }
        }
    }

    /// Abandons a pending consent flow. Returns whether one was pending.
    pub async fn cancel_sign_in(&self) -> bool {
        let was_pending = self.pending.lock().await.take().is_some();
        if was_pending {
            *self.state.write().await = AuthState::SignedOut;
            debug!(provider = %self.flow.provider(), "Sign-in cancelled");
        }
        was_pending
    }

    /// Installs tokens obtained elsewhere (e.g. restored by the host).
    pub async fn restore(&self, tokens: OAuthTokens) {
        self.store(tokens).await;
    }

    /// Drops the held credentials.
    pub async fn sign_out(&self) {
        *self.tokens.write().await = None;
        *self.state.write().await = AuthState::SignedOut;
        self.emit(AuthEvent::SignedOut {
            provider: self.flow.provider().to_string(),
        });
        info!(provider = %self.flow.provider(), "Signed out");
    }

    async fn store(&self, tokens: OAuthTokens) {
        *self.tokens.write().await = Some(tokens);
        *self.state.write().await = AuthState::SignedIn;
    }

    fn emit(&self, event: AuthEvent) {
        self.event_bus.emit(CoreEvent::Auth(event)).ok();
    }

    async fn refresh(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        let current = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;
        if !current.expires_within(TOKEN_REFRESH_BUFFER_SECS) {
            return Ok(current.access_token);
        }

        let refresh_token = current.refresh_token.ok_or_else(|| {
            AuthError::TokenRefreshFailed("no refresh token was issued".to_string())
        })?;

        *self.state.write().await = AuthState::TokenRefreshing;
        match self.flow.refresh_access_token(&refresh_token).await {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                let expires_at = tokens.expires_at.timestamp();
                self.store(tokens).await;
                self.emit(AuthEvent::TokenRefreshed {
                    provider: self.flow.provider().to_string(),
                    expires_at,
                });
                Ok(access_token)
            }
            Err(err) => {
                *self.state.write().await = AuthState::SignedIn;
                self.emit(AuthEvent::AuthError {
                    provider: self.flow.provider().to_string(),
                    message: err.to_string(),
                    recoverable: err.is_recoverable(),
                });
                Err(err)
            }
        }
    }
}

#[async_trait]
impl TokenProvider for OAuthSession {
    async fn access_token(&self) -> Result<String> {
        let tokens = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        if !tokens.expires_within(TOKEN_REFRESH_BUFFER_SECS) {
            return Ok(tokens.access_token);
        }

        debug!(provider = %self.flow.provider(), "Access token near expiry, refreshing");
        self.refresh().await
    }
}
