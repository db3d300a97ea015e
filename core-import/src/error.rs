use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Connection to {source_kind} failed: {message}")]
    Connection {
        source_kind: String,
        message: String,
    },

    #[error("{0}")]
    Validation(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Select at least one item before importing")]
    EmptySelection,

    #[error("Import session {session_id} is already in progress")]
    SessionInProgress { session_id: String },

    #[error("No active import session")]
    NoActiveSession,

    #[error("No connector registered for source {0}")]
    ConnectorNotRegistered(String),

    #[error("Source {0} is not available")]
    SourceUnavailable(String),

    #[error("Import cancelled")]
    Cancelled,

    #[error("Finalization failed: {0}")]
    Finalization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid session ID: {0}")]
    InvalidSessionId(String),

    #[error("Invalid import status: {0}")]
    InvalidStatus(String),

    #[error("Unknown import source: {0}")]
    UnknownSource(String),

    #[error("Invalid classification: {0}")]
    InvalidClassification(String),
}

impl ImportError {
    /// Build a connection error for a source.
    pub fn connection(source_kind: impl ToString, message: impl ToString) -> Self {
        ImportError::Connection {
            source_kind: source_kind.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the user can recover by editing input or restarting the flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ImportError::Connection { .. }
                | ImportError::Validation(_)
                | ImportError::EmptySelection
                | ImportError::Finalization(_)
                | ImportError::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
