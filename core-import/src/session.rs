//! # Transfer Session State Machine
//!
//! One attempt to import media from a single source.
//!
//! ## State Machine
//!
//! ```text
//! Idle ─→ Connecting ─→ Connected ─→ Scanning ─→ Selecting ─→ Transferring ─→ Completed
//!   └──────────────(no handshake)──────↗   │                        │
//!         Connecting / Scanning / Transferring ─→ Error
//!         any non-terminal ─→ Cancelled
//!         any ─→ Idle (reset, new session id)
//! ```
//!
//! `Transferring` is unreachable while nothing is selected. Progress never
//! decreases within a session; only `cancel` and `reset` return it to 0.

use crate::selection::SelectionSet;
use crate::types::{DiscoveredItem, ItemId, SourceKind};
use crate::{ImportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| ImportError::InvalidSessionId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Connecting,
    Connected,
    Scanning,
    Selecting,
    Transferring,
    Completed,
    Cancelled,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Error
        )
    }

    /// Whether a run is underway (neither idle nor terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != SessionStatus::Idle
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Scanning => "scanning",
            SessionStatus::Selecting => "selecting",
            SessionStatus::Transferring => "transferring",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Error => "error",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Ok(SessionStatus::Idle),
            "connecting" => Ok(SessionStatus::Connecting),
            "connected" => Ok(SessionStatus::Connected),
            "scanning" => Ok(SessionStatus::Scanning),
            "selecting" => Ok(SessionStatus::Selecting),
            "transferring" => Ok(SessionStatus::Transferring),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            "error" => Ok(SessionStatus::Error),
            _ => Err(ImportError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single import attempt and its discovered items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSession {
    id: SessionId,
    source: SourceKind,
    status: SessionStatus,
    progress_percent: u8,
    started_at: DateTime<Utc>,
    error: Option<String>,
    selection: SelectionSet,
    imported_count: usize,
}

impl TransferSession {
    pub fn new(source: SourceKind, started_at: DateTime<Utc>) -> Self {
        Self {
            id: SessionId::new(),
            source,
            status: SessionStatus::Idle,
            progress_percent: 0,
            started_at,
            error: None,
            selection: SelectionSet::new(),
            imported_count: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress_percent
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn discovered_count(&self) -> usize {
        self.selection.len()
    }

    pub fn selected_count(&self) -> usize {
        self.selection.count()
    }

    /// Assets produced by a completed transfer.
    pub fn imported_count(&self) -> usize {
        self.imported_count
    }

    /// Start the handshake with a source that requires one.
    pub fn begin_connect(&mut self) -> Result<()> {
        if !self.source.connection_required() {
            return Err(self.rejected(
                SessionStatus::Connecting,
                format!("{} does not require a connection", self.source),
            ));
        }
        self.transition(SessionStatus::Connecting)
    }

    pub fn mark_connected(&mut self) -> Result<()> {
        self.transition(SessionStatus::Connected)
    }

    /// Start discovery, either directly from `Idle` or after a handshake.
    pub fn begin_scan(&mut self) -> Result<()> {
        if self.status == SessionStatus::Idle && self.source.connection_required() {
            return Err(self.rejected(
                SessionStatus::Scanning,
                format!("{} must be connected before scanning", self.source),
            ));
        }
        self.transition(SessionStatus::Scanning)
    }

    /// Raise progress. Values below the current one are ignored.
    pub fn set_progress(&mut self, percent: u8) -> Result<u8> {
        if !matches!(
            self.status,
            SessionStatus::Scanning | SessionStatus::Transferring
        ) {
            return Err(self.rejected_op("set_progress", "Session must be scanning or transferring"));
        }
        self.progress_percent = self.progress_percent.max(percent.min(100));
        Ok(self.progress_percent)
    }

    /// Add discovered items. Allowed while scanning and, for sources that
    /// add items on demand (links), while selecting.
    pub fn add_discovered<I>(&mut self, items: I) -> Result<usize>
    where
        I: IntoIterator<Item = DiscoveredItem>,
    {
        if !matches!(
            self.status,
            SessionStatus::Scanning | SessionStatus::Selecting
        ) {
            return Err(self.rejected_op("add_discovered", "Session must be scanning or selecting"));
        }
        Ok(self.selection.extend(items))
    }

    pub fn finish_scan(&mut self) -> Result<()> {
        self.transition(SessionStatus::Selecting)?;
        self.progress_percent = 100;
        Ok(())
    }

    /// Flip one item. Ignored outside `Selecting` and for unknown ids.
    pub fn toggle(&mut self, id: &ItemId) -> bool {
        self.status == SessionStatus::Selecting && self.selection.toggle(id)
    }

    /// Select all, or clear all if everything is selected. Ignored outside `Selecting`.
    pub fn toggle_all(&mut self) -> bool {
        if self.status != SessionStatus::Selecting {
            return false;
        }
        self.selection.toggle_all();
        true
    }

    /// Selected items in discovery order.
    pub fn selected_items(&self) -> Vec<DiscoveredItem> {
        self.selection.selected().cloned().collect()
    }

    /// # Errors
    ///
    /// `EmptySelection` when nothing is selected.
    pub fn begin_transfer(&mut self) -> Result<()> {
        if self.status == SessionStatus::Selecting && self.selection.count() == 0 {
            return Err(ImportError::EmptySelection);
        }
        self.transition(SessionStatus::Transferring)
    }

    pub fn complete(&mut self, imported_count: usize) -> Result<()> {
        self.transition(SessionStatus::Completed)?;
        self.imported_count = imported_count;
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(SessionStatus::Error)?;
        self.error = Some(message.into());
        Ok(())
    }

    /// Abandon the session. Discovered items are dropped and progress returns to 0.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(SessionStatus::Cancelled)?;
        self.selection.clear();
        self.progress_percent = 0;
        Ok(())
    }

    /// Return to `Idle` as a fresh session for the same source.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = TransferSession::new(self.source, now);
    }

    fn transition(&mut self, to: SessionStatus) -> Result<()> {
        self.validate_transition(to)?;
        self.status = to;
        Ok(())
    }

    fn validate_transition(&self, to: SessionStatus) -> Result<()> {
        use SessionStatus::*;

        let valid = match (self.status, to) {
            (Idle, Connecting) => true,
            (Idle, Scanning) => true,
            (Connecting, Connected) => true,
            (Connected, Scanning) => true,
            (Scanning, Selecting) => true,
            (Selecting, Transferring) => true,
            (Transferring, Completed) => true,

            // Failure branches
            (Connecting, Error) | (Scanning, Error) | (Transferring, Error) => true,

            // Terminal states cannot transition
            (Completed, _) | (Cancelled, _) | (Error, _) => false,

            (_, Cancelled) => true,

            _ => false,
        };

        if !valid {
            return Err(self.rejected(
                to,
                format!("Cannot transition from {} to {}", self.status, to),
            ));
        }

        Ok(())
    }

    fn rejected(&self, to: SessionStatus, reason: String) -> ImportError {
        ImportError::InvalidStateTransition {
            from: self.status.as_str().to_string(),
            to: to.as_str().to_string(),
            reason,
        }
    }

    fn rejected_op(&self, op: &str, reason: &str) -> ImportError {
        ImportError::InvalidStateTransition {
            from: self.status.as_str().to_string(),
            to: op.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(source: SourceKind) -> TransferSession {
        TransferSession::new(source, Utc::now())
    }

    fn items(n: usize) -> Vec<DiscoveredItem> {
        (0..n)
            .map(|i| DiscoveredItem::new(format!("item-{i}"), format!("IMG_{i}.jpg"), "sim://x"))
            .collect()
    }

    fn selecting(source: SourceKind, n: usize) -> TransferSession {
        let mut s = session(source);
        if source.connection_required() {
            s.begin_connect().unwrap();
            s.mark_connected().unwrap();
        }
        s.begin_scan().unwrap();
        s.add_discovered(items(n)).unwrap();
        s.finish_scan().unwrap();
        s
    }

    #[test]
    fn test_session_id_from_string() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = SessionId::from_string(uuid_str).unwrap();
        assert_eq!(id.as_str(), uuid_str);
        assert!(SessionId::from_string("nope").is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(
            "SCANNING".parse::<SessionStatus>().unwrap(),
            SessionStatus::Scanning
        );
        assert!("paused".parse::<SessionStatus>().is_err());
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Idle.is_active());
        assert!(SessionStatus::Connected.is_active());
    }

    #[test]
    fn test_connected_source_full_workflow() {
        let mut s = session(SourceKind::Cloud);
        s.begin_connect().unwrap();
        assert_eq!(s.status(), SessionStatus::Connecting);
        s.mark_connected().unwrap();
        s.begin_scan().unwrap();
        assert_eq!(s.set_progress(40).unwrap(), 40);
        assert_eq!(s.add_discovered(items(12)).unwrap(), 12);
        s.finish_scan().unwrap();
        assert_eq!(s.status(), SessionStatus::Selecting);
        assert_eq!(s.progress_percent(), 100);

        s.toggle(&ItemId::new("item-3"));
        s.begin_transfer().unwrap();
        s.complete(1).unwrap();
        assert_eq!(s.status(), SessionStatus::Completed);
        assert_eq!(s.imported_count(), 1);
    }

    #[test]
    fn test_local_source_scans_without_connecting() {
        let mut s = session(SourceKind::Local);
        assert!(matches!(
            s.begin_connect(),
            Err(ImportError::InvalidStateTransition { .. })
        ));
        s.begin_scan().unwrap();
        assert_eq!(s.status(), SessionStatus::Scanning);
    }

    #[test]
    fn test_connected_source_cannot_skip_handshake() {
        let mut s = session(SourceKind::Drive);
        assert!(s.begin_scan().is_err());
        assert_eq!(s.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut s = session(SourceKind::Local);
        s.begin_scan().unwrap();
        s.set_progress(60).unwrap();
        assert_eq!(s.set_progress(20).unwrap(), 60);
        assert_eq!(s.set_progress(250).unwrap(), 100);
    }

    #[test]
    fn test_progress_rejected_outside_scanning() {
        let mut s = session(SourceKind::Local);
        assert!(s.set_progress(10).is_err());
    }

    #[test]
    fn test_transfer_requires_selection() {
        let mut s = selecting(SourceKind::Local, 5);
        assert!(matches!(s.begin_transfer(), Err(ImportError::EmptySelection)));
        assert_eq!(s.status(), SessionStatus::Selecting);

        s.toggle_all();
        s.toggle_all();
        assert!(matches!(s.begin_transfer(), Err(ImportError::EmptySelection)));
    }

    #[test]
    fn test_transfer_unreachable_from_other_states() {
        let mut s = session(SourceKind::Local);
        assert!(s.begin_transfer().is_err());
        s.begin_scan().unwrap();
        assert!(s.begin_transfer().is_err());
    }

    #[test]
    fn test_toggle_ignored_outside_selecting() {
        let mut s = session(SourceKind::Local);
        s.begin_scan().unwrap();
        s.add_discovered(items(2)).unwrap();
        assert!(!s.toggle(&ItemId::new("item-0")));
        assert!(!s.toggle_all());
        assert_eq!(s.selected_count(), 0);
    }

    #[test]
    fn test_cancel_clears_items_and_progress() {
        let mut s = session(SourceKind::Local);
        s.begin_scan().unwrap();
        s.set_progress(48).unwrap();
        s.add_discovered(items(3)).unwrap();

        s.cancel().unwrap();
        assert_eq!(s.status(), SessionStatus::Cancelled);
        assert_eq!(s.progress_percent(), 0);
        assert_eq!(s.discovered_count(), 0);
    }

    #[test]
    fn test_cancel_from_every_non_terminal_state() {
        let mut idle = session(SourceKind::Cloud);
        assert!(idle.cancel().is_ok());

        let mut connecting = session(SourceKind::Cloud);
        connecting.begin_connect().unwrap();
        assert!(connecting.cancel().is_ok());

        let mut transferring = selecting(SourceKind::Local, 2);
        transferring.toggle_all();
        transferring.begin_transfer().unwrap();
        assert!(transferring.cancel().is_ok());
    }

    #[test]
    fn test_terminal_states_cannot_transition() {
        let mut s = selecting(SourceKind::Local, 1);
        s.toggle_all();
        s.begin_transfer().unwrap();
        s.complete(1).unwrap();

        assert!(s.clone().cancel().is_err());
        assert!(s.clone().fail("late").is_err());
        assert!(s.begin_scan().is_err());
    }

    #[test]
    fn test_fail_records_message() {
        let mut s = session(SourceKind::Drive);
        s.begin_connect().unwrap();
        s.fail("token expired").unwrap();
        assert_eq!(s.status(), SessionStatus::Error);
        assert_eq!(s.error(), Some("token expired"));
    }

    #[test]
    fn test_fail_not_allowed_while_selecting() {
        let mut s = selecting(SourceKind::Local, 1);
        assert!(s.fail("nope").is_err());
    }

    #[test]
    fn test_reset_yields_fresh_idle_session() {
        let mut s = session(SourceKind::Cloud);
        let original_id = s.id();
        s.begin_connect().unwrap();
        s.fail("offline").unwrap();

        s.reset(Utc::now());
        assert_eq!(s.status(), SessionStatus::Idle);
        assert_eq!(s.source(), SourceKind::Cloud);
        assert_ne!(s.id(), original_id);
        assert!(s.error().is_none());
    }

    #[test]
    fn test_link_session_accepts_items_while_selecting() {
        let mut s = selecting(SourceKind::Link, 0);
        let added = s
            .add_discovered(vec![DiscoveredItem::new("link:1", "a.png", "https://x/a.png").selected()])
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(s.selected_count(), 1);
    }
}
