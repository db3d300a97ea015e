//! End-to-end import flows through the coordinator.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::time::SystemClock;
use bytes::Bytes;
use core_import::{
    Classification, ConnectionHandle, DiscoveredItem, FetchedAsset, Folder, FolderId,
    HttpLinkProbe, ImportConfig, ImportCoordinator, ImportError, ImportTarget,
    InMemoryAssetLibrary, ItemId, LinkConnector, LinkStatus, LocalFolderConnector,
    ProgressConfig, ScanStream, ScanUpdate, SessionStatus, SimulatedCloudConnector,
    SourceConnector, SourceKind,
};
use core_runtime::events::{CoreEvent, EventBus, ImportEvent, LibraryEvent};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    coordinator: ImportCoordinator,
    library: Arc<InMemoryAssetLibrary>,
    bus: EventBus,
}

fn harness() -> Harness {
    let library = Arc::new(InMemoryAssetLibrary::with_folders(vec![
        Folder::new("f_client", "Client: Nike"),
        Folder::new("f_personal", "Personal"),
    ]));
    let bus = EventBus::new(1024);
    let coordinator = ImportCoordinator::new(
        ImportConfig::default(),
        library.clone(),
        bus.clone(),
        Arc::new(SystemClock),
    )
    .unwrap();
    Harness {
        coordinator,
        library,
        bus,
    }
}

fn cloud_connector(items: usize) -> Arc<SimulatedCloudConnector> {
    let config = ImportConfig::default();
    Arc::new(
        SimulatedCloudConnector::new(
            SourceKind::Cloud,
            config.connect_delay,
            config.progress,
            SimulatedCloudConnector::sample_items(items),
        )
        .unwrap(),
    )
}

async fn wait_for_status(coordinator: &ImportCoordinator, status: SessionStatus) {
    for _ in 0..10_000 {
        if coordinator.status().await == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never reached {status}");
}

fn status_changes(events: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<(String, String)> {
    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Import(ImportEvent::StatusChanged { from, to, .. }) = event {
            changes.push((from, to));
        }
    }
    changes
}

/// Serves a fixed body for every request.
struct StaticHttp {
    status: u16,
    body: &'static [u8],
}

#[async_trait]
impl HttpClient for StaticHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: self.status,
            headers: HashMap::new(),
            body: Bytes::from_static(self.body),
        })
    }
}

/// Discovers items instantly and fails to fetch one of them.
struct FlakyConnector {
    items: Vec<DiscoveredItem>,
    fail_on: ItemId,
}

#[async_trait]
impl SourceConnector for FlakyConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    async fn connect(&self, _cancel: &CancellationToken) -> core_import::Result<ConnectionHandle> {
        Ok(ConnectionHandle::new(SourceKind::Local))
    }

    async fn scan(
        &self,
        _handle: &ConnectionHandle,
        _cancel: CancellationToken,
    ) -> core_import::Result<ScanStream> {
        let updates: Vec<_> = self
            .items
            .iter()
            .cloned()
            .map(|item| Ok(ScanUpdate::Discovered(item)))
            .collect();
        Ok(stream::iter(updates).boxed())
    }

    async fn fetch(
        &self,
        item: &DiscoveredItem,
        _cancel: &CancellationToken,
    ) -> core_import::Result<FetchedAsset> {
        if item.id == self.fail_on {
            return Err(ImportError::connection("local", "file vanished"));
        }
        Ok(FetchedAsset::from_item(item))
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_three_of_twelve_into_client_folder() {
    let h = harness();
    let mut events = h.bus.subscribe();
    h.coordinator.register_connector(cloud_connector(12)).await;

    let session_id = h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;

    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.id(), session_id);
    assert_eq!(snapshot.discovered_count(), 12);
    assert_eq!(snapshot.progress_percent(), 100);

    for id in ["sim-0002", "sim-0005", "sim-0011"] {
        assert!(h.coordinator.toggle(&ItemId::new(id)).await);
    }
    assert_eq!(h.coordinator.selected_count().await, 3);

    let folder = h.library.find_folder_by_name("Client: Nike").await.unwrap();
    let assets = h
        .coordinator
        .confirm(ImportTarget::new(Classification::Upload).in_folder(folder.id.clone()))
        .await
        .unwrap();

    assert_eq!(assets.len(), 3);
    assert!(assets
        .iter()
        .all(|a| a.folder_id == Some(FolderId::new("f_client"))));
    let titles: Vec<_> = assets.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["IMG_0002.jpg", "IMG_0005.jpg", "IMG_0011.jpg"]);
    assert_eq!(h.library.assets_in(&folder.id).await.len(), 3);
    assert_eq!(h.library.len().await, 3);

    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.status(), SessionStatus::Completed);
    assert_eq!(snapshot.imported_count(), 3);

    let changes = status_changes(&mut events);
    let expected: Vec<(String, String)> = [
        ("idle", "connecting"),
        ("connecting", "connected"),
        ("connected", "scanning"),
        ("scanning", "selecting"),
        ("selecting", "transferring"),
        ("transferring", "completed"),
    ]
    .iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect();
    assert_eq!(changes, expected);
}

#[tokio::test(start_paused = true)]
async fn test_progress_events_are_monotonic() {
    let h = harness();
    let mut events = h.bus.subscribe();
    h.coordinator.register_connector(cloud_connector(4)).await;

    h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;

    let mut progress = Vec::new();
    let mut discovered_totals = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::Import(ImportEvent::Progress { percent, .. }) => progress.push(percent),
            CoreEvent::Import(ImportEvent::ItemsDiscovered { total, .. }) => {
                discovered_totals.push(total)
            }
            _ => {}
        }
    }

    assert_eq!(progress.len(), 50);
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(discovered_totals, vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_scan_resets_to_idle() {
    let h = harness();
    let mut events = h.bus.subscribe();
    h.coordinator.register_connector(cloud_connector(12)).await;

    h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Scanning).await;
    loop {
        let snapshot = h.coordinator.snapshot().await.unwrap();
        if snapshot.progress_percent() >= 20 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    h.coordinator.cancel().await.unwrap();

    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.status(), SessionStatus::Idle);
    assert_eq!(snapshot.progress_percent(), 0);
    assert_eq!(snapshot.discovered_count(), 0);

    // The abandoned run must not touch the reset session
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.status(), SessionStatus::Idle);
    assert_eq!(snapshot.progress_percent(), 0);
    assert!(h.library.is_empty().await);

    let mut saw_cancelled = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Import(ImportEvent::Cancelled { .. }) = event {
            saw_cancelled = true;
        }
    }
    assert!(saw_cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_stale_auto_scan_timer_does_not_touch_new_session() {
    let h = harness();
    h.coordinator.register_connector(cloud_connector(2)).await;

    let first = h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Connected).await;

    h.coordinator.cancel().await.unwrap();
    let second = h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    assert_ne!(first, second);

    // The first run's auto-scan delay would have elapsed by now
    tokio::time::sleep(Duration::from_millis(600)).await;
    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.id(), second);
    assert_eq!(snapshot.status(), SessionStatus::Connecting);

    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;
    assert_eq!(h.coordinator.snapshot().await.unwrap().discovered_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_empty_selection_is_rejected() {
    let h = harness();
    h.coordinator.register_connector(cloud_connector(5)).await;

    h.coordinator.start_discovery(SourceKind::Cloud).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;
    assert!(!h.coordinator.can_confirm().await);

    let result = h
        .coordinator
        .confirm(ImportTarget::new(Classification::Upload))
        .await;
    assert!(matches!(result, Err(ImportError::EmptySelection)));
    assert_eq!(h.coordinator.status().await, Some(SessionStatus::Selecting));

    h.coordinator.toggle_all().await;
    assert_eq!(h.coordinator.selected_count().await, 5);
    h.coordinator.toggle_all().await;
    assert_eq!(h.coordinator.selected_count().await, 0);

    assert!(matches!(
        h.coordinator
            .confirm(ImportTarget::new(Classification::Upload))
            .await,
        Err(ImportError::EmptySelection)
    ));
    assert!(h.library.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_link_creates_nothing() {
    let h = harness();
    let probe = HttpLinkProbe::new(
        Arc::new(StaticHttp {
            status: 200,
            body: b"<html><body>Not an image</body></html>",
        }),
        Duration::from_secs(5),
    );
    let coordinator = h.coordinator.with_link_probe(Arc::new(probe));
    coordinator.register_connector(Arc::new(LinkConnector)).await;

    coordinator.start_discovery(SourceKind::Link).await.unwrap();
    wait_for_status(&coordinator, SessionStatus::Selecting).await;

    let status = coordinator
        .submit_link("https://example.com/gallery")
        .await
        .unwrap();
    assert!(matches!(status, LinkStatus::Error(_)));
    assert!(matches!(coordinator.link_status().await, LinkStatus::Error(_)));

    assert!(matches!(
        coordinator.add_link().await,
        Err(ImportError::Validation(_))
    ));
    assert!(matches!(
        coordinator
            .confirm(ImportTarget::new(Classification::Upload))
            .await,
        Err(ImportError::EmptySelection)
    ));
    assert!(h.library.is_empty().await);
    assert_eq!(coordinator.status().await, Some(SessionStatus::Selecting));
}

#[tokio::test(start_paused = true)]
async fn test_valid_link_is_imported() {
    let h = harness();
    let mut events = h.bus.subscribe();
    let probe = HttpLinkProbe::new(
        Arc::new(StaticHttp {
            status: 200,
            body: b"\xFF\xD8\xFF\xE0\x00\x10JFIF\x00",
        }),
        Duration::from_secs(5),
    );
    let coordinator = h.coordinator.with_link_probe(Arc::new(probe));
    coordinator.register_connector(Arc::new(LinkConnector)).await;

    coordinator.start_discovery(SourceKind::Link).await.unwrap();
    wait_for_status(&coordinator, SessionStatus::Selecting).await;

    assert_eq!(
        coordinator
            .submit_link("https://images.example.com/moodboard/sneaker.jpg")
            .await
            .unwrap(),
        LinkStatus::Valid
    );
    let item_id = coordinator.add_link().await.unwrap();
    assert_eq!(
        item_id.as_str(),
        "link:https://images.example.com/moodboard/sneaker.jpg"
    );
    assert_eq!(coordinator.link_status().await, LinkStatus::Empty);

    let assets = coordinator
        .confirm(ImportTarget::new(Classification::Upload).in_folder("f_personal"))
        .await
        .unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].title, "sneaker.jpg");
    assert_eq!(
        assets[0].source_uri,
        "https://images.example.com/moodboard/sneaker.jpg"
    );

    let mut imported = None;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Library(LibraryEvent::AssetsImported {
            asset_ids,
            folder_id,
            classification,
        }) = event
        {
            imported = Some((asset_ids, folder_id, classification));
        }
    }
    let (asset_ids, folder_id, classification) = imported.unwrap();
    assert_eq!(asset_ids, vec![assets[0].id.to_string()]);
    assert_eq!(folder_id.as_deref(), Some("f_personal"));
    assert_eq!(classification, "upload");
}

#[tokio::test]
async fn test_failed_fetch_leaves_library_untouched() {
    let h = harness();
    let items: Vec<_> = (0..5)
        .map(|i| DiscoveredItem::new(format!("f{i}"), format!("f{i}.png"), format!("file:///f{i}.png")))
        .collect();
    h.coordinator
        .register_connector(Arc::new(FlakyConnector {
            items,
            fail_on: ItemId::new("f3"),
        }))
        .await;

    h.coordinator.start_discovery(SourceKind::Local).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;
    h.coordinator.toggle_all().await;

    let result = h
        .coordinator
        .confirm(ImportTarget::new(Classification::Export))
        .await;
    assert!(matches!(result, Err(ImportError::Connection { .. })));
    assert!(h.library.is_empty().await);

    let snapshot = h.coordinator.snapshot().await.unwrap();
    assert_eq!(snapshot.status(), SessionStatus::Error);
    assert!(snapshot.error().unwrap().contains("file vanished"));
}

#[tokio::test]
async fn test_local_folder_import_reads_files() {
    let dir = std::env::temp_dir().join(format!("core-import-local-{}", std::process::id()));
    let _ = tokio::fs::remove_dir_all(&dir).await;
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(dir.join("a.png"), b"\x89PNG\r\n\x1a\nfake").await.unwrap();
    tokio::fs::write(dir.join("b.jpg"), b"\xFF\xD8\xFFfake").await.unwrap();
    tokio::fs::write(dir.join("notes.txt"), b"skip me").await.unwrap();

    let h = harness();
    let config = ImportConfig::default();
    h.coordinator
        .register_connector(Arc::new(LocalFolderConnector::new(
            Arc::new(TokioFileSystem::new()),
            dir.clone(),
            config.image_extensions.clone(),
        )))
        .await;

    h.coordinator.start_discovery(SourceKind::Local).await.unwrap();
    wait_for_status(&h.coordinator, SessionStatus::Selecting).await;
    assert_eq!(h.coordinator.snapshot().await.unwrap().discovered_count(), 2);

    h.coordinator.toggle_all().await;
    let assets = h
        .coordinator
        .confirm(ImportTarget::new(Classification::Upload))
        .await
        .unwrap();

    let ids: HashSet<_> = assets.iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 2);
    let png = assets.iter().find(|a| a.title == "a.png").unwrap();
    assert_eq!(
        h.library.content(&png.id).await,
        Some(Bytes::from_static(b"\x89PNG\r\n\x1a\nfake"))
    );

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}

#[tokio::test]
async fn test_progress_config_is_validated() {
    let library = Arc::new(InMemoryAssetLibrary::new());
    let result = ImportCoordinator::new(
        ImportConfig {
            progress: ProgressConfig {
                tick: Duration::from_millis(30),
                step: 0,
            },
            ..Default::default()
        },
        library,
        EventBus::new(16),
        Arc::new(SystemClock),
    );
    assert!(matches!(result, Err(ImportError::Config(_))));
}
