//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! clock) into the import core. Desktop apps typically enable the
//! `desktop-shims` feature, which supplies reqwest and tokio based bridges;
//! the `google-drive` feature adds the Drive import source.
//!
//! [`CoreService`] decides which import sources a user sees from their
//! [`Tier`](capabilities::Tier), starts imports through the shared
//! [`ImportCoordinator`], and forwards typed [`Route`]s to the host's
//! [`Navigator`].

pub mod capabilities;
pub mod error;
pub mod navigation;

pub use capabilities::{capabilities_for, Capability, CapabilitySet, Tier};
pub use error::{CoreError, Result};
pub use navigation::{ChannelNavigator, GeneratorDraft, Navigator, NoopNavigator, Route};

use std::path::PathBuf;
use std::sync::Arc;

use core_import::{
    AssetItem, Folder, HttpLinkProbe, ImportConfig, ImportCoordinator, ImportSource,
    ImportTarget, InMemoryAssetLibrary, LinkConnector, LocalFolderConnector, SessionId,
    SimulatedCloudConnector, SourceKind,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvents};
use tokio::sync::broadcast::Receiver;
use tracing::{info, instrument, warn};

#[cfg(feature = "google-drive")]
use core_auth::OAuthSession;

/// Redirect URI used when the Drive config does not name one.
pub const DEFAULT_DRIVE_REDIRECT_URI: &str = "http://127.0.0.1:8765/callback";

/// Number of photos the simulated device offers by default.
pub const DEFAULT_SIMULATED_ITEMS: usize = 12;

/// Per-user settings that are not part of the runtime config.
#[derive(Clone)]
pub struct ServiceOptions {
    pub tier: Tier,
    pub import: ImportConfig,
    /// Directory scanned by the local import source
    pub local_root: Option<PathBuf>,
    /// Folders the library starts with
    pub folders: Vec<Folder>,
    pub simulated_items: usize,
    pub navigator: Arc<dyn Navigator>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            import: ImportConfig::default(),
            local_root: None,
            folders: Vec::new(),
            simulated_items: DEFAULT_SIMULATED_ITEMS,
            navigator: Arc::new(NoopNavigator),
        }
    }
}

impl ServiceOptions {
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_import_config(mut self, import: ImportConfig) -> Self {
        self.import = import;
        self
    }

    pub fn with_local_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.local_root = Some(root.into());
        self
    }

    pub fn with_folders(mut self, folders: Vec<Folder>) -> Self {
        self.folders = folders;
        self
    }

    pub fn with_simulated_items(mut self, count: usize) -> Self {
        self.simulated_items = count;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    config: Arc<CoreConfig>,
    tier: Tier,
    capabilities: Arc<CapabilitySet>,
    event_bus: EventBus,
    library: Arc<InMemoryAssetLibrary>,
    imports: Arc<ImportCoordinator>,
    navigator: Arc<dyn Navigator>,
    #[cfg(feature = "google-drive")]
    drive_auth: Option<Arc<OAuthSession>>,
}

impl CoreService {
    /// Build the service and register a connector for every enabled source.
    ///
    /// # Errors
    ///
    /// Fails if the runtime or import config is invalid, or if a connector
    /// cannot be constructed.
    #[instrument(skip_all, fields(tier = %options.tier))]
    pub async fn bootstrap(config: CoreConfig, options: ServiceOptions) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let library = Arc::new(InMemoryAssetLibrary::with_folders(options.folders.clone()));

        let mut coordinator = ImportCoordinator::new(
            options.import.clone(),
            library.clone(),
            event_bus.clone(),
            config.clock.clone(),
        )?;

        let features = config.features;
        if features.enable_link_import {
            if let Some(http) = &config.http_client {
                coordinator = coordinator.with_link_probe(Arc::new(HttpLinkProbe::new(
                    http.clone(),
                    options.import.link_probe_timeout,
                )));
            }
            coordinator.register_connector(Arc::new(LinkConnector)).await;
        }

        if features.enable_local_import {
            match (&config.file_system, &options.local_root) {
                (Some(fs), Some(root)) => {
                    coordinator
                        .register_connector(Arc::new(LocalFolderConnector::new(
                            fs.clone(),
                            root.clone(),
                            options.import.image_extensions.clone(),
                        )))
                        .await;
                }
                (_, None) => warn!("Local import enabled without a root directory; skipping"),
                (None, _) => warn!("Local import enabled without FileSystemAccess; skipping"),
            }
        }

        let simulated = SimulatedCloudConnector::new(
            SourceKind::Cloud,
            options.import.connect_delay,
            options.import.progress,
            SimulatedCloudConnector::sample_items(options.simulated_items),
        )?;
        coordinator.register_connector(Arc::new(simulated)).await;

        #[cfg(feature = "google-drive")]
        let drive_auth = if features.enable_drive_import {
            Some(register_drive(&config, &event_bus, &coordinator).await?)
        } else {
            None
        };

        #[cfg(not(feature = "google-drive"))]
        if features.enable_drive_import {
            warn!("Drive import enabled but the google-drive feature is off; skipping");
        }

        info!("Core service ready");

        Ok(Self {
            config: Arc::new(config),
            tier: options.tier,
            capabilities: Arc::new(capabilities_for(options.tier)),
            event_bus,
            library,
            imports: Arc::new(coordinator),
            navigator: options.navigator,
            #[cfg(feature = "google-drive")]
            drive_auth,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    pub fn library(&self) -> Arc<InMemoryAssetLibrary> {
        Arc::clone(&self.library)
    }

    /// Import events for one session, for hosts driving a progress view.
    ///
    /// Events emitted before this call are not replayed.
    pub fn watch_session(&self, session_id: SessionId) -> SessionEvents {
        SessionEvents::new(self.event_bus.subscribe(), session_id.to_string())
    }

    /// The coordinator, for selection and link operations on the current session.
    pub fn imports(&self) -> &ImportCoordinator {
        &self.imports
    }

    /// The Drive consent session, when Drive import is wired up.
    #[cfg(feature = "google-drive")]
    pub fn drive_auth(&self) -> Option<Arc<OAuthSession>> {
        self.drive_auth.clone()
    }

    /// Sources the picker should show: registered and unlocked by the tier.
    pub async fn available_sources(&self) -> Vec<ImportSource> {
        let registered = self.imports.registered_sources().await;
        self.imports
            .registry()
            .available(|kind| registered.contains(&kind) && self.capabilities.allows_source(kind))
            .into_iter()
            .cloned()
            .collect()
    }

    /// Start a session for `source` once the tier allows it.
    pub async fn start_import(&self, source: SourceKind) -> Result<SessionId> {
        self.capabilities
            .require(Capability::required_for_source(source))?;
        Ok(self.imports.start_discovery(source).await?)
    }

    /// Finalize the current selection. Importing into a folder needs client folders.
    pub async fn confirm_import(&self, target: ImportTarget) -> Result<Vec<AssetItem>> {
        if target.folder_id.is_some() {
            self.capabilities.require(Capability::ClientFolders)?;
        }
        Ok(self.imports.confirm(target).await?)
    }

    pub fn navigate(&self, route: Route) -> Result<()> {
        self.navigator.navigate(route)
    }
}

#[cfg(feature = "google-drive")]
async fn register_drive(
    config: &CoreConfig,
    event_bus: &EventBus,
    coordinator: &ImportCoordinator,
) -> Result<Arc<OAuthSession>> {
    use core_auth::{OAuthConfig, OAuthFlowManager};
    use provider_google_drive::{DriveSourceConnector, GoogleDriveConnector};

    let http = config
        .http_client
        .clone()
        .ok_or_else(|| CoreError::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: "Drive import needs an HttpClient".to_string(),
        })?;

    let drive = &config.drive_api_config;
    let client_id = drive
        .client_id
        .clone()
        .ok_or_else(|| CoreError::InitializationFailed("Drive client id missing".to_string()))?;
    let redirect_uri = drive
        .redirect_uri
        .clone()
        .unwrap_or_else(|| DEFAULT_DRIVE_REDIRECT_URI.to_string());

    let oauth = OAuthConfig::google_drive(client_id, drive.client_secret.clone(), redirect_uri);
    let session = Arc::new(OAuthSession::new(
        OAuthFlowManager::new(oauth, http.clone()),
        event_bus.clone(),
    ));

    let api = GoogleDriveConnector::new(http, session.clone()).with_page_size(drive.page_size);
    coordinator
        .register_connector(Arc::new(DriveSourceConnector::new(Arc::new(api))))
        .await;

    Ok(session)
}

/// Bootstrap with desktop bridges and default runtime settings.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, ServiceOptions, Tier};
///
/// let core = bootstrap_desktop(
///     ServiceOptions::default()
///         .with_tier(Tier::Pro)
///         .with_local_root("/home/me/Pictures"),
/// )
/// .await?;
/// let sources = core.available_sources().await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(options: ServiceOptions) -> Result<CoreService> {
    let config = CoreConfig::builder().build()?;
    CoreService::bootstrap(config, options).await
}
