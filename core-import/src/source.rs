//! # Import Source Registry
//!
//! Static descriptors for every source an import can start from, plus the
//! [`SourceConnector`] seam each source implements.
//!
//! A connector turns a source into discovered items:
//!
//! 1. `connect` performs the handshake and returns a [`ConnectionHandle`]
//! 2. `scan` streams [`ScanUpdate`]s until discovery finishes
//! 3. `fetch` resolves one selected item during finalization
//!
//! Every call takes a [`CancellationToken`]; implementations race their I/O
//! against it and return [`ImportError::Cancelled`] once it fires.

use crate::types::{DiscoveredItem, ItemId, SourceKind};
use crate::{ImportError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Descriptor of an import source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSource {
    pub kind: SourceKind,
    pub display_name: String,
    pub connection_required: bool,
}

impl From<SourceKind> for ImportSource {
    fn from(kind: SourceKind) -> Self {
        Self {
            kind,
            display_name: kind.display_name().to_string(),
            connection_required: kind.connection_required(),
        }
    }
}

/// Fixed list of import sources, built once at startup.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<ImportSource>,
}

impl SourceRegistry {
    /// Local device, Google Drive, cloud storage and direct link, in picker order.
    pub fn standard() -> Self {
        Self {
            sources: SourceKind::ALL.into_iter().map(ImportSource::from).collect(),
        }
    }

    pub fn all(&self) -> &[ImportSource] {
        &self.sources
    }

    pub fn get(&self, kind: SourceKind) -> Option<&ImportSource> {
        self.sources.iter().find(|source| source.kind == kind)
    }

    /// Sources passing a gate (feature flags, tier capabilities).
    pub fn available<F>(&self, mut gate: F) -> Vec<&ImportSource>
    where
        F: FnMut(SourceKind) -> bool,
    {
        self.sources
            .iter()
            .filter(|source| gate(source.kind))
            .collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub source: SourceKind,
    /// Human-readable account or device label
    pub label: Option<String>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            label: None,
            connected_at: Utc::now(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One event produced while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanUpdate {
    /// Scan progress, 0..=100
    Progress(u8),
    Discovered(DiscoveredItem),
}

pub type ScanStream = BoxStream<'static, Result<ScanUpdate>>;

/// Content resolved for a selected item during finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub item_id: ItemId,
    pub title: String,
    pub source_uri: String,
    pub size_bytes: Option<u64>,
    /// Raw bytes, when the source provides them
    pub content: Option<Bytes>,
}

impl FetchedAsset {
    /// Reference the item's preview URI without downloading anything.
    pub fn from_item(item: &DiscoveredItem) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.name.clone(),
            source_uri: item.preview_uri.clone(),
            size_bytes: item.size_bytes,
            content: None,
        }
    }

    pub fn with_content(mut self, content: Bytes) -> Self {
        self.size_bytes = Some(content.len() as u64);
        self.content = Some(content);
        self
    }
}

/// Async seam between the state machine and a concrete source.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn connect(&self, cancel: &CancellationToken) -> Result<ConnectionHandle>;

    /// Stream discovered items. The stream should end when `cancel` fires.
    async fn scan(&self, handle: &ConnectionHandle, cancel: CancellationToken)
        -> Result<ScanStream>;

    async fn fetch(&self, item: &DiscoveredItem, cancel: &CancellationToken) -> Result<FetchedAsset> {
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        Ok(FetchedAsset::from_item(item))
    }
}

/// Race a future against a cancellation token.
pub async fn cancellable<T, F>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ImportError::Cancelled),
        result = future => result,
    }
}
