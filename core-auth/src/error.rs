use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("OAuth state mismatch (expected {expected}, got {actual})")]
    StateMismatch { expected: String, actual: String },

    #[error("Authorization code rejected: {0}")]
    InvalidAuthCode(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Sign-in already in progress for {provider}")]
    SignInInProgress { provider: String },

    #[error("No sign-in in progress for {provider}")]
    NoSignInInProgress { provider: String },

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether retrying the same operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_)
                | AuthError::OperationTimeout { .. }
                | AuthError::TokenRefreshFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
