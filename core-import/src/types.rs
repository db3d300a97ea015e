//! Domain types shared by the import flow.

use crate::{ImportError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for an imported asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Create a new random asset ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a discovered item, assigned by its source.
///
/// Local items use their path, Drive items their file id, links the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of a library folder (e.g. `f_client`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(String);

impl FolderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FolderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Source & Classification
// ============================================================================

/// Where an import session pulls media from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Files on this device
    Local,
    /// Google Drive
    Drive,
    /// Generic cloud storage / paired device
    Cloud,
    /// A single image URL
    Link,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Local,
        SourceKind::Drive,
        SourceKind::Cloud,
        SourceKind::Link,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Local => "local",
            SourceKind::Drive => "drive",
            SourceKind::Cloud => "cloud",
            SourceKind::Link => "link",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Local => "This Device",
            SourceKind::Drive => "Google Drive",
            SourceKind::Cloud => "Cloud Storage",
            SourceKind::Link => "Direct Link",
        }
    }

    /// Whether the source needs a handshake before it can be scanned.
    pub fn connection_required(&self) -> bool {
        matches!(self, SourceKind::Drive | SourceKind::Cloud)
    }
}

impl FromStr for SourceKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "local" => Ok(SourceKind::Local),
            "drive" => Ok(SourceKind::Drive),
            "cloud" => Ok(SourceKind::Cloud),
            "link" => Ok(SourceKind::Link),
            _ => Err(ImportError::UnknownSource(s.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag assigned to an imported asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    #[default]
    Upload,
    Generated,
    Remix,
    Export,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Upload => "upload",
            Classification::Generated => "generated",
            Classification::Remix => "remix",
            Classification::Export => "export",
        }
    }
}

impl FromStr for Classification {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "upload" => Ok(Classification::Upload),
            "generated" => Ok(Classification::Generated),
            "remix" => Ok(Classification::Remix),
            "export" => Ok(Classification::Export),
            _ => Err(ImportError::InvalidClassification(s.to_string())),
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A candidate file found during a scan, not yet imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub id: ItemId,
    /// File name shown in the picker
    pub name: String,
    /// URI the host can render as a thumbnail
    pub preview_uri: String,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub is_selected: bool,
}

impl DiscoveredItem {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, preview_uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            preview_uri: preview_uri.into(),
            mime_type: None,
            size_bytes: None,
            is_selected: false,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn selected(mut self) -> Self {
        self.is_selected = true;
        self
    }
}

/// An asset record produced by finalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub id: AssetId,
    pub title: String,
    pub source_uri: String,
    pub created_at: DateTime<Utc>,
    pub classification: Classification,
    pub folder_id: Option<FolderId>,
    pub size_bytes: Option<u64>,
}

/// A library folder assets can be imported into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
}

impl Folder {
    pub fn new(id: impl Into<FolderId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_unique() {
        assert_ne!(AssetId::new(), AssetId::new());
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("drive".parse::<SourceKind>().unwrap(), SourceKind::Drive);
        assert_eq!("LINK".parse::<SourceKind>().unwrap(), SourceKind::Link);
        assert!(matches!(
            "ftp".parse::<SourceKind>(),
            Err(ImportError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_source_kind_connection_required() {
        assert!(!SourceKind::Local.connection_required());
        assert!(SourceKind::Drive.connection_required());
        assert!(SourceKind::Cloud.connection_required());
        assert!(!SourceKind::Link.connection_required());
        assert_eq!(SourceKind::Local.display_name(), "This Device");
    }

    #[test]
    fn test_classification_round_trip() {
        for classification in [
            Classification::Upload,
            Classification::Generated,
            Classification::Remix,
            Classification::Export,
        ] {
            assert_eq!(
                classification.as_str().parse::<Classification>().unwrap(),
                classification
            );
        }
        assert_eq!(Classification::default(), Classification::Upload);
    }

    #[test]
    fn test_discovered_item_builder() {
        let item = DiscoveredItem::new("a1", "beach.jpg", "file:///tmp/beach.jpg")
            .with_mime_type("image/jpeg")
            .with_size(2048);
        assert_eq!(item.id.as_str(), "a1");
        assert_eq!(item.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(item.size_bytes, Some(2048));
        assert!(!item.is_selected);
    }

    #[test]
    fn test_serde_uses_lowercase_tokens() {
        let json = serde_json::to_string(&SourceKind::Cloud).unwrap();
        assert_eq!(json, "\"cloud\"");
        let json = serde_json::to_string(&Classification::Remix).unwrap();
        assert_eq!(json, "\"remix\"");
    }
}
