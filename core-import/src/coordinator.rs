//! # Import Coordinator
//!
//! Owns the current transfer session and drives it through its states.
//!
//! ## Workflow
//!
//! 1. [`start_discovery`](ImportCoordinator::start_discovery) creates a session
//!    and spawns a discovery run
//! 2. The run connects (waiting `auto_scan_delay` before scanning sources that
//!    need a handshake), streams scan updates into the session and moves it
//!    to `Selecting`
//! 3. The host toggles items, then calls [`confirm`](ImportCoordinator::confirm),
//!    which finalizes the selection and completes the session
//!
//! Each run carries the session id and a cancellation token. Updates from a
//! run whose token was cancelled, or whose session has since been replaced,
//! are discarded.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = ImportCoordinator::new(config, library, event_bus, clock)?;
//! coordinator.register_connector(Arc::new(LinkConnector)).await;
//!
//! let session_id = coordinator.start_discovery(SourceKind::Cloud).await?;
//! // ... wait for ImportEvent::StatusChanged { to: "selecting", .. }
//! coordinator.toggle_all().await;
//! let assets = coordinator.confirm(ImportTarget::new(Classification::Upload)).await?;
//! ```

use crate::finalizer::{AssetSink, ImportFinalizer, ImportTarget};
use crate::link::{LinkImport, LinkProbe, LinkStatus};
use crate::progress::ProgressConfig;
use crate::session::{SessionId, SessionStatus, TransferSession};
use crate::source::{cancellable, ScanUpdate, SourceConnector, SourceRegistry};
use crate::types::{AssetItem, ItemId, SourceKind};
use crate::{ImportError, Result};
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, EventBus, ImportEvent, LibraryEvent};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Import flow configuration
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Simulated handshake latency for sources without real I/O
    pub connect_delay: Duration,

    /// Pause between `Connected` and `Scanning`
    pub auto_scan_delay: Duration,

    /// Tick schedule of simulated scans
    pub progress: ProgressConfig,

    /// Upper bound on a link validation probe
    pub link_probe_timeout: Duration,

    /// File extensions treated as images by the local connector
    pub image_extensions: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(1500),
            auto_scan_delay: Duration::from_millis(500),
            progress: ProgressConfig::default(),
            link_probe_timeout: Duration::from_secs(15),
            image_extensions: ["jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ImportConfig {
    pub fn validate(&self) -> Result<()> {
        self.progress.validate()?;
        if self.link_probe_timeout.is_zero() {
            return Err(ImportError::Config(
                "link_probe_timeout must be greater than zero".to_string(),
            ));
        }
        if self.image_extensions.is_empty() {
            return Err(ImportError::Config(
                "image_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Token of the run currently allowed to mutate the session
struct ActiveRun {
    session_id: SessionId,
    token: CancellationToken,
}

#[derive(Default)]
struct SessionSlot {
    session: Option<TransferSession>,
    run: Option<ActiveRun>,
}

/// Orchestrates a single import surface.
pub struct ImportCoordinator {
    config: Arc<ImportConfig>,
    registry: Arc<SourceRegistry>,
    connectors: Arc<RwLock<HashMap<SourceKind, Arc<dyn SourceConnector>>>>,
    slot: Arc<Mutex<SessionSlot>>,
    link: Arc<Mutex<LinkImport>>,
    link_probe: Option<Arc<dyn LinkProbe>>,
    finalizer: Arc<ImportFinalizer>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl ImportCoordinator {
    pub fn new(
        config: ImportConfig,
        sink: Arc<dyn AssetSink>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(SourceRegistry::standard()),
            connectors: Arc::new(RwLock::new(HashMap::new())),
            slot: Arc::new(Mutex::new(SessionSlot::default())),
            link: Arc::new(Mutex::new(LinkImport::new())),
            link_probe: None,
            finalizer: Arc::new(ImportFinalizer::new(sink, clock.clone())),
            event_bus,
            clock,
        })
    }

    /// Attach the probe used by [`submit_link`](Self::submit_link).
    pub fn with_link_probe(mut self, probe: Arc<dyn LinkProbe>) -> Self {
        self.link_probe = Some(probe);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Register the connector for its source, replacing any previous one.
    pub async fn register_connector(&self, connector: Arc<dyn SourceConnector>) {
        let kind = connector.kind();
        self.connectors.write().await.insert(kind, connector);
        info!("Registered import connector: {}", kind);
    }

    /// Sources with a registered connector, in registry order.
    pub async fn registered_sources(&self) -> Vec<SourceKind> {
        let connectors = self.connectors.read().await;
        self.registry
            .all()
            .iter()
            .map(|source| source.kind)
            .filter(|kind| connectors.contains_key(kind))
            .collect()
    }

    /// Start a new session for `source` and run discovery in the background.
    ///
    /// # Errors
    ///
    /// - `ConnectorNotRegistered` if no connector serves `source`
    /// - `SessionInProgress` if the current session is still running
    #[instrument(skip(self), fields(source = %source))]
    pub async fn start_discovery(&self, source: SourceKind) -> Result<SessionId> {
        let connector = self.connector(source).await?;

        let (session_id, token, status) = {
            let mut slot = self.slot.lock().await;
            if let Some(current) = &slot.session {
                if current.status().is_active() {
                    return Err(ImportError::SessionInProgress {
                        session_id: current.id().to_string(),
                    });
                }
            }
            if let Some(stale) = slot.run.take() {
                stale.token.cancel();
            }

            let mut session = TransferSession::new(source, self.clock.now());
            if source.connection_required() {
                session.begin_connect()?;
            } else {
                session.begin_scan()?;
            }

            let session_id = session.id();
            let token = CancellationToken::new();
            let status = session.status();
            slot.session = Some(session);
            slot.run = Some(ActiveRun {
                session_id,
                token: token.clone(),
            });
            (session_id, token, status)
        };

        if source == SourceKind::Link {
            self.link.lock().await.edit("");
        }

        self.emit(ImportEvent::SessionStarted {
            session_id: session_id.to_string(),
            source: source.to_string(),
        });
        self.emit_status(session_id, SessionStatus::Idle, status);

        let coordinator = self.clone_for_task();
        tokio::spawn(async move {
            coordinator
                .run_discovery(session_id, token, connector)
                .await;
        });

        info!("Started import session {} for {}", session_id, source);
        Ok(session_id)
    }

    /// Flip one discovered item. Returns `false` if nothing changed.
    pub async fn toggle(&self, item_id: &ItemId) -> bool {
        let mut slot = self.slot.lock().await;
        slot.session
            .as_mut()
            .map(|session| session.toggle(item_id))
            .unwrap_or(false)
    }

    /// Select all items, or clear all if every item is selected.
    pub async fn toggle_all(&self) -> bool {
        let mut slot = self.slot.lock().await;
        slot.session
            .as_mut()
            .map(|session| session.toggle_all())
            .unwrap_or(false)
    }

    pub async fn selected_count(&self) -> usize {
        let slot = self.slot.lock().await;
        slot.session
            .as_ref()
            .map(|session| session.selected_count())
            .unwrap_or(0)
    }

    /// Whether the confirm action should be enabled.
    pub async fn can_confirm(&self) -> bool {
        let slot = self.slot.lock().await;
        slot.session
            .as_ref()
            .map(|s| s.status() == SessionStatus::Selecting && s.selected_count() > 0)
            .unwrap_or(false)
    }

    /// Finalize the selection into `target` and complete the session.
    ///
    /// # Errors
    ///
    /// - `EmptySelection` when nothing is selected (the session stays in `Selecting`)
    /// - `Cancelled` when the session is cancelled mid-transfer
    /// - any finalization error, after which the session is in `Error`
    #[instrument(skip(self, target), fields(classification = %target.classification))]
    pub async fn confirm(&self, target: ImportTarget) -> Result<Vec<AssetItem>> {
        let (session_id, source, items, token) = {
            let mut slot = self.slot.lock().await;
            let session = slot.session.as_mut().ok_or(ImportError::NoActiveSession)?;
            let before = session.status();
            session.begin_transfer()?;
            self.emit_status(session.id(), before, session.status());

            let session_id = session.id();
            let source = session.source();
            let items = session.selected_items();
            let token = CancellationToken::new();
            slot.run = Some(ActiveRun {
                session_id,
                token: token.clone(),
            });
            (session_id, source, items, token)
        };

        let connector = match self.connector(source).await {
            Ok(connector) => connector,
            Err(e) => {
                self.fail_run(session_id, &token, &e).await;
                return Err(e);
            }
        };

        let assets = match self
            .finalizer
            .finalize(&items, connector.as_ref(), &target, &token)
            .await
        {
            Ok(assets) => assets,
            Err(ImportError::Cancelled) if token.is_cancelled() => {
                debug!("Transfer cancelled for session {}", session_id);
                return Err(ImportError::Cancelled);
            }
            Err(e) => {
                error!("Finalization failed for session {}: {}", session_id, e);
                self.fail_run(session_id, &token, &e).await;
                return Err(e);
            }
        };

        let count = assets.len();
        if let Err(e) = self
            .update(session_id, &token, |session| session.complete(count))
            .await
        {
            // The batch is already written; the session was reset underneath us
            warn!("Import session {} closed after finalization: {}", session_id, e);
        }

        let folder_id = target.folder_id.as_ref().map(|id| id.to_string());
        self.emit(ImportEvent::Completed {
            session_id: session_id.to_string(),
            assets_imported: count,
            folder_id: folder_id.clone(),
        });
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::AssetsImported {
                asset_ids: assets.iter().map(|asset| asset.id.to_string()).collect(),
                folder_id,
                classification: target.classification.to_string(),
            }))
            .ok();

        info!("Imported {} assets in session {}", count, session_id);
        Ok(assets)
    }

    /// Abandon the current run and return the session to `Idle`.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if let Some(run) = slot.run.take() {
            run.token.cancel();
        }

        let Some(session) = slot.session.as_mut() else {
            return Ok(());
        };
        if session.status() == SessionStatus::Idle {
            return Ok(());
        }

        let session_id = session.id();
        let before = session.status();
        if !before.is_terminal() {
            session.cancel()?;
            self.emit_status(session_id, before, SessionStatus::Cancelled);
            self.emit(ImportEvent::Cancelled {
                session_id: session_id.to_string(),
            });
        }

        let ended = session.status();
        session.reset(self.clock.now());
        self.emit_status(session_id, ended, SessionStatus::Idle);

        info!("Import session {} cancelled", session_id);
        Ok(())
    }

    /// Close the import surface. The session is discarded.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let closed = {
            let mut slot = self.slot.lock().await;
            if let Some(run) = slot.run.take() {
                run.token.cancel();
            }
            slot.session.take()
        };

        if let Some(session) = closed {
            if session.status().is_active() {
                self.emit(ImportEvent::Cancelled {
                    session_id: session.id().to_string(),
                });
            }
            debug!("Closed import session {}", session.id());
        }

        self.link.lock().await.edit("");
    }

    /// Restart discovery after a failure.
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` unless the session is in `Error`.
    pub async fn retry(&self) -> Result<SessionId> {
        let source = {
            let mut slot = self.slot.lock().await;
            let session = slot.session.as_mut().ok_or(ImportError::NoActiveSession)?;
            if session.status() != SessionStatus::Error {
                return Err(ImportError::InvalidStateTransition {
                    from: session.status().to_string(),
                    to: "retry".to_string(),
                    reason: "Only failed sessions can be retried".to_string(),
                });
            }
            let session_id = session.id();
            session.reset(self.clock.now());
            self.emit_status(session_id, SessionStatus::Error, SessionStatus::Idle);
            session.source()
        };

        self.start_discovery(source).await
    }

    /// Copy of the current session, if any.
    pub async fn snapshot(&self) -> Option<TransferSession> {
        self.slot.lock().await.session.clone()
    }

    pub async fn status(&self) -> Option<SessionStatus> {
        self.slot.lock().await.session.as_ref().map(|s| s.status())
    }

    /// Replace the link input and validate it.
    ///
    /// # Errors
    ///
    /// `SourceUnavailable` if no link probe is configured. Validation
    /// failures are reported through the returned status, not as errors.
    #[instrument(skip(self, input))]
    pub async fn submit_link(&self, input: &str) -> Result<LinkStatus> {
        let probe = self
            .link_probe
            .clone()
            .ok_or_else(|| ImportError::SourceUnavailable(SourceKind::Link.to_string()))?;

        let url = {
            let mut link = self.link.lock().await;
            link.edit(input);
            match link.begin_validation() {
                Some(url) => url,
                None => return Ok(link.status().clone()),
            }
        };

        let verdict = match tokio::time::timeout(self.config.link_probe_timeout, probe.probe(&url)).await {
            Ok(verdict) => verdict,
            Err(_) => Err(ImportError::Validation(
                "Timed out while loading the image".to_string(),
            )),
        };

        let mut link = self.link.lock().await;
        Ok(link.finish_validation(&url, verdict).clone())
    }

    pub async fn link_status(&self) -> LinkStatus {
        self.link.lock().await.status().clone()
    }

    /// Add the validated link to the current link session.
    ///
    /// # Errors
    ///
    /// - `Validation` if the link has not been validated
    /// - `InvalidStateTransition` unless a link session is selecting
    pub async fn add_link(&self) -> Result<ItemId> {
        let mut slot = self.slot.lock().await;
        let session = slot.session.as_mut().ok_or(ImportError::NoActiveSession)?;
        if session.source() != SourceKind::Link || session.status() != SessionStatus::Selecting {
            return Err(ImportError::InvalidStateTransition {
                from: session.status().to_string(),
                to: "add_link".to_string(),
                reason: "Links can only be added to a link session that is selecting".to_string(),
            });
        }

        let item = self.link.lock().await.take_item().ok_or_else(|| {
            ImportError::Validation("Validate the link before adding it".to_string())
        })?;
        let item_id = item.id.clone();
        let added = session.add_discovered([item])?;
        if added > 0 {
            self.emit(ImportEvent::ItemsDiscovered {
                session_id: session.id().to_string(),
                count: added,
                total: session.discovered_count(),
            });
        }
        Ok(item_id)
    }

    /// Clone for background task
    fn clone_for_task(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            connectors: Arc::clone(&self.connectors),
            slot: Arc::clone(&self.slot),
            link: Arc::clone(&self.link),
            link_probe: self.link_probe.clone(),
            finalizer: Arc::clone(&self.finalizer),
            event_bus: self.event_bus.clone(),
            clock: Arc::clone(&self.clock),
        }
    }

    async fn connector(&self, source: SourceKind) -> Result<Arc<dyn SourceConnector>> {
        self.connectors
            .read()
            .await
            .get(&source)
            .cloned()
            .ok_or_else(|| ImportError::ConnectorNotRegistered(source.to_string()))
    }

    #[instrument(skip(self, token, connector), fields(session_id = %session_id))]
    async fn run_discovery(
        &self,
        session_id: SessionId,
        token: CancellationToken,
        connector: Arc<dyn SourceConnector>,
    ) {
        match self.discover(session_id, &token, connector.as_ref()).await {
            Ok(()) => info!("Discovery finished for session {}", session_id),
            Err(ImportError::Cancelled) if token.is_cancelled() => debug!("Discovery run abandoned"),
            Err(e) => {
                error!("Discovery failed for session {}: {}", session_id, e);
                self.fail_run(session_id, &token, &e).await;
            }
        }
    }

    async fn discover(
        &self,
        session_id: SessionId,
        token: &CancellationToken,
        connector: &dyn SourceConnector,
    ) -> Result<()> {
        let source = connector.kind();
        let handle = connector.connect(token).await?;

        if source.connection_required() {
            self.update(session_id, token, |s| s.mark_connected())
                .await?;
            let delay = self.config.auto_scan_delay;
            cancellable(token, async move {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
            self.update(session_id, token, |s| s.begin_scan()).await?;
        }

        let mut updates = connector.scan(&handle, token.clone()).await?;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(ImportError::Cancelled),
                next = updates.next() => next,
            };

            match next {
                None => break,
                Some(Ok(ScanUpdate::Progress(percent))) => {
                    let value = self
                        .update(session_id, token, |s| s.set_progress(percent))
                        .await?;
                    self.emit(ImportEvent::Progress {
                        session_id: session_id.to_string(),
                        phase: SessionStatus::Scanning.to_string(),
                        percent: value,
                    });
                }
                Some(Ok(ScanUpdate::Discovered(item))) => {
                    let (added, total) = self
                        .update(session_id, token, |s| {
                            let added = s.add_discovered([item])?;
                            Ok((added, s.discovered_count()))
                        })
                        .await?;
                    if added > 0 {
                        self.emit(ImportEvent::ItemsDiscovered {
                            session_id: session_id.to_string(),
                            count: added,
                            total,
                        });
                    }
                }
                Some(Err(e)) => return Err(e),
            }
        }

        self.update(session_id, token, |s| s.finish_scan()).await
    }

    /// Apply `apply` to the session if `token` still owns it.
    async fn update<T, F>(&self, session_id: SessionId, token: &CancellationToken, apply: F) -> Result<T>
    where
        F: FnOnce(&mut TransferSession) -> Result<T>,
    {
        let mut slot = self.slot.lock().await;
        if token.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        let session = match slot.session.as_mut() {
            Some(session) if session.id() == session_id => session,
            _ => {
                debug!("Discarding update for stale session {}", session_id);
                return Err(ImportError::Cancelled);
            }
        };

        let before = session.status();
        let value = apply(session)?;
        let after = session.status();
        if before != after {
            self.emit_status(session_id, before, after);
        }
        Ok(value)
    }

    async fn fail_run(&self, session_id: SessionId, token: &CancellationToken, err: &ImportError) {
        let message = err.to_string();
        let failed = self
            .update(session_id, token, |s| s.fail(message.clone()))
            .await;

        if failed.is_ok() {
            self.emit(ImportEvent::Failed {
                session_id: session_id.to_string(),
                message,
                recoverable: err.is_recoverable(),
            });
        }
    }

    fn emit(&self, event: ImportEvent) {
        self.event_bus.emit(CoreEvent::Import(event)).ok();
    }

    fn emit_status(&self, session_id: SessionId, from: SessionStatus, to: SessionStatus) {
        self.emit(ImportEvent::StatusChanged {
            session_id: session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        });
    }
}
