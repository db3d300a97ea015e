//! # Core Configuration Module
//!
//! Provides configuration management for the studio import core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the bridges and settings the import flow depends on.
//! It enforces fail-fast validation so that an enabled feature never meets a
//! missing bridge at runtime.
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `FileSystemAccess` - File I/O for local imports (desktop default: tokio fs)
//! - `Clock` - Time source for asset timestamps (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `FileSystemAccess` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, DriveApiConfig};
//!
//! let config = CoreConfig::builder()
//!     .enable_drive_import(true)
//!     .drive_api_config(
//!         DriveApiConfig::new("client-id.apps.googleusercontent.com")
//!             .with_redirect_uri("http://127.0.0.1:8765/callback"),
//!     )
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates feature flags against the provided bridges and
//! returns actionable messages when a capability is missing:
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! // Fails: Drive import needs OAuth client credentials
//! let result = CoreConfig::builder().enable_drive_import(true).build();
//! assert!(result.is_err());
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SystemClock};
use std::sync::Arc;

/// Core configuration for the studio import core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// HTTP client for Drive and link probing (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// File system access for local folder imports (optional with desktop default)
    pub file_system: Option<Arc<dyn FileSystemAccess>>,

    /// Time source used when stamping imported assets
    pub clock: Arc<dyn Clock>,

    /// Capacity of the event bus buffer
    pub event_buffer_size: usize,

    /// Feature flags
    pub features: FeatureFlags,

    /// Google Drive API configuration
    pub drive_api_config: DriveApiConfig,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field(
                "file_system",
                &self
                    .file_system
                    .as_ref()
                    .map(|_| "FileSystemAccess { ... }"),
            )
            .field("clock", &"Clock { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .field("drive_api_config", &self.drive_api_config)
            .finish()
    }
}

/// Feature flags select which import sources are wired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Import from the local device (requires FileSystemAccess)
    pub enable_local_import: bool,

    /// Import from Google Drive (requires HttpClient and Drive credentials)
    pub enable_drive_import: bool,

    /// Import from a pasted direct link (requires HttpClient)
    pub enable_link_import: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_local_import: true,
            enable_drive_import: false,
            enable_link_import: true,
        }
    }
}

/// OAuth client settings for the Google Drive integration.
///
/// The client secret is optional because installed (desktop) applications
/// use PKCE instead. It is never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DriveApiConfig {
    /// OAuth client identifier
    pub client_id: Option<String>,

    /// OAuth client secret
    pub client_secret: Option<String>,

    /// Loopback redirect URI registered for the client
    pub redirect_uri: Option<String>,

    /// Files per page when listing Drive content
    pub page_size: u32,
}

impl std::fmt::Debug for DriveApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveApiConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl DriveApiConfig {
    /// Maximum page size accepted by the Drive files endpoint.
    pub const MAX_PAGE_SIZE: u32 = 1000;

    /// Creates a config for the given OAuth client id.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: None,
            redirect_uri: None,
            page_size: 100,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Checks if OAuth credentials are present
    pub fn is_configured(&self) -> bool {
        self.client_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.client_id {
            if id.trim().is_empty() {
                return Err(Error::Config("Drive client id cannot be empty".to_string()));
            }
        }

        if let Some(uri) = &self.redirect_uri {
            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "Drive redirect URI must be an http(s) URL, got '{}'",
                    uri
                )));
            }
        }

        if self.page_size == 0 || self.page_size > Self::MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Drive page size must be between 1 and {}",
                Self::MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Event buffer size is reasonable (> 0 and <= 65,536)
    /// - Feature flags are consistent with available bridges
    /// - Drive credentials are present when Drive import is enabled
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > 65_536 {
            return Err(Error::Config(
                "Event buffer size exceeds maximum of 65,536".to_string(),
            ));
        }

        if self.features.enable_local_import && self.file_system.is_none() {
            return Err(Error::CapabilityMissing {
                capability: "FileSystemAccess".to_string(),
                message: "Local import enabled but no FileSystemAccess provided. \
                          Disable the feature or inject a FileSystemAccess implementation."
                    .to_string(),
            });
        }

        if (self.features.enable_drive_import || self.features.enable_link_import)
            && self.http_client.is_none()
        {
            return Err(Error::CapabilityMissing {
                capability: "HttpClient".to_string(),
                message: "Drive or link import enabled but no HttpClient provided. \
                          Desktop: enable the 'desktop-shims' feature. \
                          Otherwise inject a platform HttpClient implementation."
                    .to_string(),
            });
        }

        if self.features.enable_drive_import && !self.drive_api_config.is_configured() {
            return Err(Error::Config(
                "Drive import enabled but no OAuth client id configured. \
                 Use .drive_api_config(DriveApiConfig::new(...))."
                    .to_string(),
            ));
        }

        self.drive_api_config.validate()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    let client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new());
    Some(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Option<Arc<dyn FileSystemAccess>> {
    let fs: Arc<dyn FileSystemAccess> = Arc::new(bridge_desktop::TokioFileSystem::new());
    Some(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Option<Arc<dyn FileSystemAccess>> {
    None
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
    drive_api_config: Option<DriveApiConfig>,
}

impl CoreConfigBuilder {
    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the time source. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables local device import.
    ///
    /// Default: true
    pub fn enable_local_import(mut self, enabled: bool) -> Self {
        self.features.enable_local_import = enabled;
        self
    }

    /// Enables or disables Google Drive import.
    ///
    /// Requires Drive OAuth credentials.
    ///
    /// Default: false
    pub fn enable_drive_import(mut self, enabled: bool) -> Self {
        self.features.enable_drive_import = enabled;
        self
    }

    /// Enables or disables direct link import.
    ///
    /// Default: true
    pub fn enable_link_import(mut self, enabled: bool) -> Self {
        self.features.enable_link_import = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Sets the Google Drive OAuth configuration.
    pub fn drive_api_config(mut self, config: DriveApiConfig) -> Self {
        self.drive_api_config = Some(config);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - Configuration values are invalid
    /// - Feature flags are inconsistent with available bridges
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = self.http_client.or_else(provide_default_http_client);
        let file_system = self.file_system.or_else(provide_default_file_system);

        let config = CoreConfig {
            http_client,
            file_system,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
            drive_api_config: self.drive_api_config.unwrap_or_else(|| DriveApiConfig {
                page_size: 100,
                ..DriveApiConfig::default()
            }),
        };

        config.validate()?;

        Ok(config)
    }
}
