use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Unknown tier: {0}")]
    UnknownTier(String),

    #[error("Unknown route: {0}")]
    UnknownRoute(String),

    #[error("Navigation target is gone")]
    NavigatorClosed,

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Import error: {0}")]
    Import(#[from] core_import::ImportError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
