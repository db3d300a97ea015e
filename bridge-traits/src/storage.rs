//! Storage and File System Abstractions
//!
//! Provides platform-agnostic traits for local file access and remote
//! (cloud) media listing.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts the read-only file operations the local import source needs:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories, SAF/document picker
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn count_entries(fs: &dyn FileSystemAccess, dir: &Path) -> Result<usize> {
///     Ok(fs.list_directory(dir).await?.len())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// List all entries in a directory
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Read entire file contents into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;
}

/// A file listed by a remote storage provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-specific file identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// MIME type if reported by the provider
    pub mime_type: Option<String>,
    /// Size in bytes
    pub size: Option<u64>,
    /// Creation time (Unix seconds)
    pub created_at: Option<i64>,
    /// Last modification time (Unix seconds)
    pub modified_at: Option<i64>,
    /// Thumbnail URL suitable for previews
    pub thumbnail_url: Option<String>,
    /// Whether this entry is a folder
    pub is_folder: bool,
    /// Provider-specific extra attributes
    pub metadata: HashMap<String, String>,
}

impl RemoteFile {
    /// Whether the provider reports an image MIME type for this file.
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|mime| mime.starts_with("image/"))
            .unwrap_or(false)
    }
}

/// The account a remote storage provider is connected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccount {
    pub display_name: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Remote storage provider trait
///
/// Implemented by cloud connectors (e.g. Google Drive). Listing is paginated
/// through an opaque cursor; `None` means there are no further pages.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List image files, newest first, one page at a time
    async fn list_media(&self, cursor: Option<String>) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Fetch metadata for a single file
    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile>;

    /// Download file content, optionally restricted to a byte range
    async fn download(&self, file_id: &str, range: Option<&str>) -> Result<Bytes>;

    /// Describe the account the provider is authenticated as
    async fn account(&self) -> Result<RemoteAccount>;
}
