//! # Import Finalizer
//!
//! Converts the selected items of a session into asset records.
//!
//! Finalization is all-or-nothing. Every item is fetched through its source
//! connector first; if any fetch fails (or the run is cancelled) nothing is
//! written. The whole batch is then handed to the [`AssetSink`] in one call.

use crate::source::{FetchedAsset, SourceConnector};
use crate::types::{AssetId, AssetItem, Classification, DiscoveredItem, Folder, FolderId};
use crate::{ImportError, Result};
use async_trait::async_trait;
use bridge_traits::time::Clock;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Where finalized assets go and how they are tagged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportTarget {
    pub classification: Classification,
    pub folder_id: Option<FolderId>,
}

impl ImportTarget {
    pub fn new(classification: Classification) -> Self {
        Self {
            classification,
            folder_id: None,
        }
    }

    pub fn in_folder(mut self, folder_id: impl Into<FolderId>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }
}

/// An asset record together with the bytes fetched for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAsset {
    pub asset: AssetItem,
    pub content: Option<Bytes>,
}

/// Destination of finalized assets.
#[async_trait]
pub trait AssetSink: Send + Sync {
    async fn has_folder(&self, folder_id: &FolderId) -> Result<bool>;

    /// Append a whole batch. Implementations must apply all or none of it.
    async fn append(&self, batch: Vec<ImportedAsset>) -> Result<()>;
}

pub struct ImportFinalizer {
    sink: Arc<dyn AssetSink>,
    clock: Arc<dyn Clock>,
}

impl ImportFinalizer {
    pub fn new(sink: Arc<dyn AssetSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }

    /// Produce one asset per item, in input order.
    ///
    /// # Errors
    ///
    /// - `EmptySelection` when `items` is empty
    /// - `Finalization` when the target folder is unknown or the sink rejects the batch
    /// - `Cancelled` when `cancel` fires before the batch is written
    /// - any connector error raised while fetching
    #[instrument(skip_all, fields(items = items.len(), classification = %target.classification))]
    pub async fn finalize(
        &self,
        items: &[DiscoveredItem],
        connector: &dyn SourceConnector,
        target: &ImportTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<AssetItem>> {
        if items.is_empty() {
            return Err(ImportError::EmptySelection);
        }

        if let Some(folder_id) = &target.folder_id {
            if !self.sink.has_folder(folder_id).await? {
                return Err(ImportError::Finalization(format!(
                    "Unknown folder: {folder_id}"
                )));
            }
        }

        let mut fetched: Vec<FetchedAsset> = Vec::with_capacity(items.len());
        for item in items {
            let asset = connector.fetch(item, cancel).await?;
            debug!(item = %item.id, "Fetched item");
            fetched.push(asset);
        }

        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }

        let created_at = self.clock.now();
        let batch: Vec<ImportedAsset> = fetched
            .into_iter()
            .map(|fetched| ImportedAsset {
                asset: AssetItem {
                    id: AssetId::new(),
                    title: fetched.title,
                    source_uri: fetched.source_uri,
                    created_at,
                    classification: target.classification,
                    folder_id: target.folder_id.clone(),
                    size_bytes: fetched.size_bytes,
                },
                content: fetched.content,
            })
            .collect();
        let assets: Vec<AssetItem> = batch.iter().map(|imported| imported.asset.clone()).collect();

        self.sink.append(batch).await?;

        info!(count = assets.len(), "Finalized import batch");
        Ok(assets)
    }
}

/// In-memory asset collection used when no backend is attached.
#[derive(Debug, Default)]
pub struct InMemoryAssetLibrary {
    folders: RwLock<Vec<Folder>>,
    assets: RwLock<Vec<ImportedAsset>>,
}

impl InMemoryAssetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folders(folders: Vec<Folder>) -> Self {
        Self {
            folders: RwLock::new(folders),
            assets: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_folder(&self, folder: Folder) {
        let mut folders = self.folders.write().await;
        if !folders.iter().any(|f| f.id == folder.id) {
            folders.push(folder);
        }
    }

    pub async fn folders(&self) -> Vec<Folder> {
        self.folders.read().await.clone()
    }

    pub async fn find_folder_by_name(&self, name: &str) -> Option<Folder> {
        self.folders
            .read()
            .await
            .iter()
            .find(|folder| folder.name == name)
            .cloned()
    }

    /// All assets, oldest first.
    pub async fn assets(&self) -> Vec<AssetItem> {
        self.assets
            .read()
            .await
            .iter()
            .map(|imported| imported.asset.clone())
            .collect()
    }

    pub async fn assets_in(&self, folder_id: &FolderId) -> Vec<AssetItem> {
        self.assets
            .read()
            .await
            .iter()
            .filter(|imported| imported.asset.folder_id.as_ref() == Some(folder_id))
            .map(|imported| imported.asset.clone())
            .collect()
    }

    pub async fn content(&self, asset_id: &AssetId) -> Option<Bytes> {
        self.assets
            .read()
            .await
            .iter()
            .find(|imported| &imported.asset.id == asset_id)
            .and_then(|imported| imported.content.clone())
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }
}

#[async_trait]
impl AssetSink for InMemoryAssetLibrary {
    async fn has_folder(&self, folder_id: &FolderId) -> Result<bool> {
        Ok(self.folders.read().await.iter().any(|f| &f.id == folder_id))
    }

    async fn append(&self, batch: Vec<ImportedAsset>) -> Result<()> {
        self.assets.write().await.extend(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ConnectionHandle, ScanStream};
    use crate::types::{ItemId, SourceKind};
    use bridge_traits::time::FixedClock;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use std::collections::HashSet;

    mock! {
        pub Sink {}

        #[async_trait::async_trait]
        impl AssetSink for Sink {
            async fn has_folder(&self, folder_id: &FolderId) -> Result<bool>;
            async fn append(&self, batch: Vec<ImportedAsset>) -> Result<()>;
        }
    }

    /// Fetches by echoing the item, failing for one id.
    struct EchoConnector {
        fail_on: Option<ItemId>,
    }

    #[async_trait]
    impl SourceConnector for EchoConnector {
        fn kind(&self) -> SourceKind {
            SourceKind::Cloud
        }

        async fn connect(&self, _cancel: &CancellationToken) -> Result<ConnectionHandle> {
            Ok(ConnectionHandle::new(SourceKind::Cloud))
        }

        async fn scan(&self, _handle: &ConnectionHandle, _cancel: CancellationToken) -> Result<ScanStream> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn fetch(&self, item: &DiscoveredItem, _cancel: &CancellationToken) -> Result<FetchedAsset> {
            if self.fail_on.as_ref() == Some(&item.id) {
                return Err(ImportError::connection("cloud", "device disconnected"));
            }
            Ok(FetchedAsset::from_item(item).with_content(Bytes::from(item.name.clone())))
        }
    }

    fn items(n: usize) -> Vec<DiscoveredItem> {
        (0..n)
            .map(|i| {
                DiscoveredItem::new(format!("item-{i}"), format!("IMG_{i}.jpg"), format!("sim://{i}"))
                    .selected()
            })
            .collect()
    }

    fn fixed_clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
        ))
    }

    fn client_library() -> Arc<InMemoryAssetLibrary> {
        Arc::new(InMemoryAssetLibrary::with_folders(vec![Folder::new(
            "f_client",
            "Client: Nike",
        )]))
    }

    #[tokio::test]
    async fn test_finalize_n_items_unique_ids() {
        let library = client_library();
        let clock = fixed_clock();
        let finalizer = ImportFinalizer::new(library.clone(), clock.clone());
        let target = ImportTarget::new(Classification::Remix);

        let assets = finalizer
            .finalize(&items(7), &EchoConnector { fail_on: None }, &target, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(assets.len(), 7);
        let ids: HashSet<_> = assets.iter().map(|a| a.id).collect();
        assert_eq!(ids.len(), 7);
        assert!(assets.iter().all(|a| a.classification == Classification::Remix));
        assert!(assets.iter().all(|a| a.created_at == clock.now()));
        let titles: Vec<_> = assets.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles[0], "IMG_0.jpg");
        assert_eq!(titles[6], "IMG_6.jpg");
        assert_eq!(library.len().await, 7);
    }

    #[tokio::test]
    async fn test_finalize_into_folder() {
        let library = client_library();
        let finalizer = ImportFinalizer::new(library.clone(), fixed_clock());
        let folder = library.find_folder_by_name("Client: Nike").await.unwrap();
        let target = ImportTarget::new(Classification::Upload).in_folder(folder.id.clone());

        let assets = finalizer
            .finalize(&items(3), &EchoConnector { fail_on: None }, &target, &CancellationToken::new())
            .await
            .unwrap();

        assert!(assets
            .iter()
            .all(|a| a.folder_id == Some(FolderId::new("f_client"))));
        assert_eq!(library.assets_in(&folder.id).await.len(), 3);
        assert_eq!(
            library.content(&assets[0].id).await,
            Some(Bytes::from("IMG_0.jpg"))
        );
    }

    #[tokio::test]
    async fn test_finalize_unknown_folder() {
        let library = client_library();
        let finalizer = ImportFinalizer::new(library.clone(), fixed_clock());
        let target = ImportTarget::new(Classification::Upload).in_folder("f_missing");

        let result = finalizer
            .finalize(&items(2), &EchoConnector { fail_on: None }, &target, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ImportError::Finalization(_))));
        assert!(library.is_empty().await);
    }

    #[tokio::test]
    async fn test_finalize_empty_selection() {
        let finalizer = ImportFinalizer::new(client_library(), fixed_clock());
        let result = finalizer
            .finalize(
                &[],
                &EchoConnector { fail_on: None },
                &ImportTarget::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ImportError::EmptySelection)));
    }

    #[tokio::test]
    async fn test_finalize_is_atomic_on_fetch_failure() {
        let mut sink = MockSink::new();
        sink.expect_append().never();
        let finalizer = ImportFinalizer::new(Arc::new(sink), fixed_clock());

        let result = finalizer
            .finalize(
                &items(5),
                &EchoConnector {
                    fail_on: Some(ItemId::new("item-3")),
                },
                &ImportTarget::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ImportError::Connection { .. })));
    }

    #[tokio::test]
    async fn test_finalize_appends_single_batch() {
        let mut sink = MockSink::new();
        sink.expect_append()
            .times(1)
            .withf(|batch| batch.len() == 4)
            .returning(|_| Ok(()));
        let finalizer = ImportFinalizer::new(Arc::new(sink), fixed_clock());

        let assets = finalizer
            .finalize(
                &items(4),
                &EchoConnector { fail_on: None },
                &ImportTarget::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(assets.len(), 4);
    }

    #[tokio::test]
    async fn test_finalize_sink_failure_propagates() {
        let mut sink = MockSink::new();
        sink.expect_append()
            .returning(|_| Err(ImportError::Finalization("backend offline".into())));
        let finalizer = ImportFinalizer::new(Arc::new(sink), fixed_clock());

        let result = finalizer
            .finalize(
                &items(2),
                &EchoConnector { fail_on: None },
                &ImportTarget::default(),
                &CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(ImportError::Finalization(_))));
    }

    #[tokio::test]
    async fn test_finalize_cancelled_writes_nothing() {
        let library = client_library();
        let finalizer = ImportFinalizer::new(library.clone(), fixed_clock());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = finalizer
            .finalize(&items(2), &EchoConnector { fail_on: None }, &ImportTarget::default(), &cancel)
            .await;
        assert!(matches!(result, Err(ImportError::Cancelled)));
        assert!(library.is_empty().await);
    }
}
