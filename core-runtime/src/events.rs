//! Event bus for the import core.
//!
//! Sessions, the OAuth flow and the finalizer publish [`CoreEvent`]s on a
//! `tokio::sync::broadcast` channel. Hosts subscribe to drive their UI.
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ImportEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut events = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Import(ImportEvent::Progress {
//!         session_id: "session-1".to_string(),
//!         phase: "scanning".to_string(),
//!         percent: 40,
//!     }))
//!     .ok();
//!
//! assert!(matches!(events.recv().await.unwrap(), CoreEvent::Import(_)));
//! # }
//! ```
//!
//! A slow subscriber sees `RecvError::Lagged`; progress ticks are the usual
//! casualty. Emitting with no subscribers is an error publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Sized for a full progress run (50 ticks at the default step) plus
/// discovery and status events without lagging a reasonably fast subscriber.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Authentication-related events
    Auth(AuthEvent),
    /// Import session events
    Import(ImportEvent),
    /// Asset library events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Import(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Error,
            CoreEvent::Import(ImportEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Import(ImportEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedIn { .. }) => EventSeverity::Info,
            CoreEvent::Import(ImportEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::AssetsImported { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

/// Events related to connecting a cloud account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Consent flow in progress.
    SigningIn {
        /// The provider being authenticated with (e.g., "GoogleDrive").
        provider: String,
    },
    /// Account successfully connected.
    SignedIn {
        provider: String,
        /// Account display name when the provider reports one.
        account: Option<String>,
    },
    /// Account disconnected.
    SignedOut { provider: String },
    /// Token refresh completed successfully.
    TokenRefreshed {
        provider: String,
        /// Timestamp when the new token expires (Unix epoch seconds).
        expires_at: i64,
    },
    /// Authentication error occurred.
    AuthError {
        provider: String,
        /// Human-readable error message.
        message: String,
        /// Whether the error is recoverable (e.g., retry possible).
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SigningIn { .. } => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "Account connected",
            AuthEvent::SignedOut { .. } => "Account disconnected",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

/// Events emitted while a transfer session moves through its lifecycle.
///
/// Status names use the lowercase session status tokens
/// (`idle`, `connecting`, `connected`, `scanning`, `selecting`,
/// `transferring`, `completed`, `error`, `cancelled`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ImportEvent {
    /// A discovery run was started for a source.
    SessionStarted {
        session_id: String,
        /// Source token (`local`, `drive`, `cloud`, `link`).
        source: String,
    },
    /// The session moved from one status to another.
    StatusChanged {
        session_id: String,
        from: String,
        to: String,
    },
    /// Progress update during scanning or transferring.
    Progress {
        session_id: String,
        /// Status the progress belongs to.
        phase: String,
        /// 0..=100
        percent: u8,
    },
    /// New items were discovered by the scan.
    ItemsDiscovered {
        session_id: String,
        /// Items in this batch.
        count: usize,
        /// Items discovered so far.
        total: usize,
    },
    /// Items were finalized into the library.
    Completed {
        session_id: String,
        assets_imported: usize,
        folder_id: Option<String>,
    },
    /// The session entered the error state.
    Failed {
        session_id: String,
        message: String,
        /// Whether restarting discovery may succeed.
        recoverable: bool,
    },
    /// The session was cancelled by the user.
    Cancelled { session_id: String },
}

impl ImportEvent {
    fn description(&self) -> &str {
        match self {
            ImportEvent::SessionStarted { .. } => "Import session started",
            ImportEvent::StatusChanged { .. } => "Import status changed",
            ImportEvent::Progress { .. } => "Import progress updated",
            ImportEvent::ItemsDiscovered { .. } => "Import items discovered",
            ImportEvent::Completed { .. } => "Import completed",
            ImportEvent::Failed { .. } => "Import failed",
            ImportEvent::Cancelled { .. } => "Import cancelled",
        }
    }

    /// Completed, failed and cancelled end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImportEvent::Completed { .. } | ImportEvent::Failed { .. } | ImportEvent::Cancelled { .. }
        )
    }

    /// Session the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            ImportEvent::SessionStarted { session_id, .. }
            | ImportEvent::StatusChanged { session_id, .. }
            | ImportEvent::Progress { session_id, .. }
            | ImportEvent::ItemsDiscovered { session_id, .. }
            | ImportEvent::Completed { session_id, .. }
            | ImportEvent::Failed { session_id, .. }
            | ImportEvent::Cancelled { session_id } => session_id,
        }
    }
}

/// Events related to the asset library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Assets were appended to the library.
    AssetsImported {
        asset_ids: Vec<String>,
        folder_id: Option<String>,
        /// `personal` or `client`
        classification: String,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::AssetsImported { .. } => "Assets added to library",
        }
    }
}

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning an `EventBus` is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Import events for a single session.
///
/// Lagging is skipped over, since a missed progress tick is superseded by
/// the next one. The stream ends when the bus shuts down.
pub struct SessionEvents {
    receiver: Receiver<CoreEvent>,
    session_id: String,
}

impl SessionEvents {
    pub fn new(receiver: Receiver<CoreEvent>, session_id: impl Into<String>) -> Self {
        Self {
            receiver,
            session_id: session_id.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Next event for this session, or `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<ImportEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(CoreEvent::Import(event)) if event.session_id() == self.session_id => {
                    return Some(event)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, session_id = %self.session_id, "Session events lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Wait until the session reaches a terminal event.
    pub async fn until_finished(&mut self) -> Option<ImportEvent> {
        while let Some(event) = self.next().await {
            if event.is_terminal() {
                return Some(event);
            }
        }
        None
    }
}

impl fmt::Debug for SessionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionEvents")
            .field("session_id", &self.session_id)
            .finish()
    }
}
