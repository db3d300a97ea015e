//! Drive as an import source.
//!
//! Adapts any [`StorageProvider`] (normally [`GoogleDriveConnector`](crate::GoogleDriveConnector))
//! to the import flow: the account lookup is the handshake, listing pages
//! become discovered items, and finalization downloads the selected files.

use async_trait::async_trait;
use bridge_traits::error::BridgeError;
use bridge_traits::storage::{RemoteFile, StorageProvider};
use core_import::{
    cancellable, ConnectionHandle, DiscoveredItem, FetchedAsset, ImportError, ScanStream,
    ScanUpdate, SourceConnector, SourceKind,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Upper bound on files listed in a single scan
pub const DEFAULT_MAX_ITEMS: usize = 500;

pub struct DriveSourceConnector {
    provider: Arc<dyn StorageProvider>,
    max_items: usize,
}

enum Cursor {
    Next(Option<String>),
    Done,
}

impl DriveSourceConnector {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items.max(1);
        self
    }
}

fn drive_error(error: BridgeError) -> ImportError {
    match error {
        BridgeError::Cancelled => ImportError::Cancelled,
        other => ImportError::connection(SourceKind::Drive, other),
    }
}

fn discovered(file: RemoteFile) -> DiscoveredItem {
    let preview = file
        .thumbnail_url
        .clone()
        .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));

    let mut item = DiscoveredItem::new(file.id, file.name, preview);
    if let Some(mime) = file.mime_type {
        item = item.with_mime_type(mime);
    }
    if let Some(size) = file.size {
        item = item.with_size(size);
    }
    item
}

/// Progress after `page` listed pages when more remain. Approaches but never
/// reaches 100, which is reserved for the last page.
fn page_progress(page: usize) -> u8 {
    (100 - 100 / (page + 1)).min(99) as u8
}

#[async_trait]
impl SourceConnector for DriveSourceConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Drive
    }

    #[instrument(skip(self, cancel))]
    async fn connect(&self, cancel: &CancellationToken) -> core_import::Result<ConnectionHandle> {
        let account = cancellable(cancel, async {
            self.provider.account().await.map_err(drive_error)
        })
        .await?;

        info!("Connected to Google Drive");
        Ok(ConnectionHandle::new(SourceKind::Drive).with_label(account.display_name))
    }

    async fn scan(
        &self,
        _handle: &ConnectionHandle,
        cancel: CancellationToken,
    ) -> core_import::Result<ScanStream> {
        let provider = Arc::clone(&self.provider);
        let max_items = self.max_items;

        let pages = stream::unfold(
            (Cursor::Next(None), 0usize, 0usize),
            move |(cursor, page, seen)| {
                let provider = Arc::clone(&provider);
                async move {
                    let token = match cursor {
                        Cursor::Next(token) => token,
                        Cursor::Done => return None,
                    };

                    let (files, next) = match provider.list_media(token).await {
                        Ok(listing) => listing,
                        Err(e) => {
                            return Some((vec![Err(drive_error(e))], (Cursor::Done, page, seen)));
                        }
                    };

                    let page = page + 1;
                    let mut seen = seen;
                    let mut updates = Vec::with_capacity(files.len() + 1);
                    for file in files.into_iter().filter(|f| f.is_image() && !f.is_folder) {
                        if seen >= max_items {
                            break;
                        }
                        seen += 1;
                        updates.push(Ok(ScanUpdate::Discovered(discovered(file))));
                    }
                    debug!(page, seen, "Listed Drive page");

                    let next = next.filter(|_| seen < max_items);
                    let percent = if next.is_some() { page_progress(page) } else { 100 };
                    updates.push(Ok(ScanUpdate::Progress(percent)));

                    let cursor = match next {
                        Some(token) => Cursor::Next(Some(token)),
                        None => Cursor::Done,
                    };
                    Some((updates, (cursor, page, seen)))
                }
            },
        );

        Ok(pages
            .flat_map(stream::iter)
            .take_until(cancel.cancelled_owned())
            .boxed())
    }

    #[instrument(skip(self, item, cancel), fields(item_id = %item.id))]
    async fn fetch(
        &self,
        item: &DiscoveredItem,
        cancel: &CancellationToken,
    ) -> core_import::Result<FetchedAsset> {
        let content = cancellable(cancel, async {
            self.provider
                .download(item.id.as_str(), None)
                .await
                .map_err(drive_error)
        })
        .await?;

        Ok(FetchedAsset::from_item(item).with_content(content))
    }
}
