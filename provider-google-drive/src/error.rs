//! Error types for the Google Drive provider

use bridge_traits::error::BridgeError;
use core_import::{ImportError, SourceKind};
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Token acquisition failed or the API rejected the token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Drive answered 429
    #[error("Rate limit exceeded")]
    RateLimited,

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

impl From<GoogleDriveError> for ImportError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::BridgeError(BridgeError::Cancelled) => ImportError::Cancelled,
            other => ImportError::connection(SourceKind::Drive, other.to_string()),
        }
    }
}

impl From<core_auth::AuthError> for GoogleDriveError {
    fn from(error: core_auth::AuthError) -> Self {
        GoogleDriveError::AuthenticationFailed(error.to_string())
    }
}
