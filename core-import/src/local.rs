//! Connector for image files in a folder on this device.

use crate::source::{cancellable, ConnectionHandle, FetchedAsset, ScanStream, ScanUpdate, SourceConnector};
use crate::types::{DiscoveredItem, SourceKind};
use crate::{ImportError, Result};
use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};
use url::Url;

/// Lists a single directory (non-recursive) and offers its image files.
pub struct LocalFolderConnector {
    file_system: Arc<dyn FileSystemAccess>,
    root: PathBuf,
    extensions: Vec<String>,
}

impl LocalFolderConnector {
    pub fn new(
        file_system: Arc<dyn FileSystemAccess>,
        root: impl Into<PathBuf>,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            file_system,
            root: root.into(),
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn mime_type(path: &Path) -> Option<String> {
        image::ImageFormat::from_path(path)
            .ok()
            .map(|format| format.to_mime_type().to_string())
    }

    fn preview_uri(path: &Path) -> String {
        Url::from_file_path(path)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    fn connection_error(&self, err: impl std::fmt::Display) -> ImportError {
        ImportError::connection(SourceKind::Local, format!("{}: {}", self.root.display(), err))
    }
}

#[async_trait]
impl SourceConnector for LocalFolderConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    #[instrument(skip(self, cancel), fields(root = %self.root.display()))]
    async fn connect(&self, cancel: &CancellationToken) -> Result<ConnectionHandle> {
        let exists = cancellable(cancel, async {
            self.file_system
                .exists(&self.root)
                .await
                .map_err(|e| self.connection_error(e))
        })
        .await?;

        if !exists {
            return Err(self.connection_error("folder does not exist"));
        }

        Ok(ConnectionHandle::new(SourceKind::Local).with_label(self.root.display().to_string()))
    }

    #[instrument(skip(self, _handle, cancel), fields(root = %self.root.display()))]
    async fn scan(&self, _handle: &ConnectionHandle, cancel: CancellationToken) -> Result<ScanStream> {
        let entries = cancellable(&cancel, async {
            self.file_system
                .list_directory(&self.root)
                .await
                .map_err(|e| self.connection_error(e))
        })
        .await?;

        let candidates: Vec<PathBuf> = entries.into_iter().filter(|p| self.is_image(p)).collect();
        let total = candidates.len();
        debug!(total, "Found image files");

        let mut updates = Vec::with_capacity(total * 2);
        for (index, path) in candidates.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            let metadata = match self.file_system.metadata(&path).await {
                Ok(metadata) if metadata.is_directory => continue,
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let mut item = DiscoveredItem::new(
                path.display().to_string(),
                name,
                Self::preview_uri(&path),
            );
            if let Some(mime) = Self::mime_type(&path) {
                item = item.with_mime_type(mime);
            }
            if let Some(metadata) = metadata {
                item = item.with_size(metadata.size);
            }

            updates.push(Ok(ScanUpdate::Discovered(item)));
            let percent = ((index + 1) * 100 / total.max(1)) as u8;
            updates.push(Ok(ScanUpdate::Progress(percent)));
        }

        Ok(stream::iter(updates)
            .take_until(cancel.cancelled_owned())
            .boxed())
    }

    async fn fetch(&self, item: &DiscoveredItem, cancel: &CancellationToken) -> Result<FetchedAsset> {
        let path = PathBuf::from(item.id.as_str());
        let content = cancellable(cancel, async {
            self.file_system
                .read_file(&path)
                .await
                .map_err(|e| self.connection_error(e))
        })
        .await?;

        Ok(FetchedAsset::from_item(item).with_content(content))
    }
}
