//! # Link Import
//!
//! Adds a single image by URL. The URL is validated with a probe before it
//! can be added to the session:
//!
//! ```text
//! Empty ──validate──→ Validating ──→ Valid ──add──→ Empty
//!   ↑                      │
//!   └──────edit─────── Error(message)
//! ```
//!
//! Validation failures stay inline in [`LinkStatus::Error`]; they never move
//! the transfer session to its error state.

use crate::source::{ConnectionHandle, ScanStream, SourceConnector};
use crate::types::{DiscoveredItem, SourceKind};
use crate::{ImportError, Result};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

/// Validation state of the link field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum LinkStatus {
    #[default]
    Empty,
    Validating,
    Valid,
    Error(String),
}

/// What a successful probe learned about the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbedImage {
    pub mime_type: String,
    /// Default extension for the detected format
    pub extension: String,
    pub size_bytes: Option<u64>,
}

/// Checks that a URL resolves to a loadable image.
#[async_trait]
pub trait LinkProbe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<ProbedImage>;
}

/// Largest image a link probe will download
pub const MAX_LINK_IMAGE_BYTES: u64 = 50 * 1024 * 1024;

/// Downloads the URL and sniffs the image format from its magic bytes.
pub struct HttpLinkProbe {
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl HttpLinkProbe {
    pub fn new(http_client: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self {
            http_client,
            timeout,
        }
    }
}

#[async_trait]
impl LinkProbe for HttpLinkProbe {
    #[instrument(skip(self), fields(host = url.host_str().unwrap_or_default()))]
    async fn probe(&self, url: &Url) -> Result<ProbedImage> {
        let request = HttpRequest::new(HttpMethod::Get, url.as_str())
            .timeout(self.timeout)
            .max_body_bytes(MAX_LINK_IMAGE_BYTES);
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| ImportError::Validation(format!("Image could not be loaded: {e}")))?;

        if !response.is_success() {
            return Err(ImportError::Validation(format!(
                "Image could not be loaded (HTTP {})",
                response.status
            )));
        }

        let format = image::guess_format(&response.body).map_err(|_| {
            ImportError::Validation("URL does not point to a supported image".to_string())
        })?;

        debug!(format = ?format, bytes = response.body.len(), "Link probe succeeded");
        Ok(ProbedImage {
            mime_type: format.to_mime_type().to_string(),
            extension: format
                .extensions_str()
                .first()
                .copied()
                .unwrap_or("img")
                .to_string(),
            size_bytes: Some(response.body.len() as u64),
        })
    }
}

/// State of the link input field.
#[derive(Debug, Clone, Default)]
pub struct LinkImport {
    input: String,
    status: LinkStatus,
    validated: Option<(Url, ProbedImage)>,
}

impl LinkImport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> &LinkStatus {
        &self.status
    }

    /// Replace the input. Any previous verdict is discarded.
    pub fn edit(&mut self, input: impl Into<String>) {
        self.input = input.into();
        self.status = LinkStatus::Empty;
        self.validated = None;
    }

    /// Parse the input and move to `Validating`.
    ///
    /// Returns the URL to probe, or `None` when the input is blank or
    /// malformed (the status then says why).
    pub fn begin_validation(&mut self) -> Option<Url> {
        self.validated = None;
        let trimmed = self.input.trim();
        if trimmed.is_empty() {
            self.status = LinkStatus::Empty;
            return None;
        }

        match parse_image_url(trimmed) {
            Ok(url) => {
                self.status = LinkStatus::Validating;
                Some(url)
            }
            Err(err) => {
                self.status = LinkStatus::Error(err.to_string());
                None
            }
        }
    }

    /// Apply a probe verdict. Ignored if the input changed meanwhile.
    pub fn finish_validation(&mut self, url: &Url, verdict: Result<ProbedImage>) -> &LinkStatus {
        let still_current = self.status == LinkStatus::Validating
            && parse_image_url(self.input.trim()).ok().as_ref() == Some(url);
        if !still_current {
            return &self.status;
        }

        match verdict {
            Ok(probed) => {
                self.status = LinkStatus::Valid;
                self.validated = Some((url.clone(), probed));
            }
            Err(err) => {
                self.status = LinkStatus::Error(err.to_string());
            }
        }
        &self.status
    }

    /// Validate the current input with `probe`.
    pub async fn validate(&mut self, probe: &dyn LinkProbe) -> &LinkStatus {
        let Some(url) = self.begin_validation() else {
            return &self.status;
        };
        let verdict = probe.probe(&url).await;
        self.finish_validation(&url, verdict)
    }

    /// Whether the "Add" action is enabled.
    pub fn can_add(&self) -> bool {
        self.status == LinkStatus::Valid && self.validated.is_some()
    }

    /// Turn a validated link into a selected item and clear the field.
    pub fn take_item(&mut self) -> Option<DiscoveredItem> {
        if !self.can_add() {
            return None;
        }
        let (url, probed) = self.validated.take()?;
        self.input.clear();
        self.status = LinkStatus::Empty;

        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("linked-image.{}", probed.extension));

        let mut item = DiscoveredItem::new(format!("link:{url}"), name, url.as_str())
            .with_mime_type(probed.mime_type)
            .selected();
        if let Some(size) = probed.size_bytes {
            item = item.with_size(size);
        }
        Some(item)
    }
}

fn parse_image_url(input: &str) -> Result<Url> {
    let url = Url::parse(input)
        .map_err(|_| ImportError::Validation("Enter a valid image URL".to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ImportError::Validation(format!(
            "Unsupported link scheme: {other}"
        ))),
    }
}

/// Connector for the link source. Items arrive through [`LinkImport`], so
/// the scan finishes immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkConnector;

#[async_trait]
impl SourceConnector for LinkConnector {
    fn kind(&self) -> SourceKind {
        SourceKind::Link
    }

    async fn connect(&self, cancel: &CancellationToken) -> Result<ConnectionHandle> {
        if cancel.is_cancelled() {
            return Err(ImportError::Cancelled);
        }
        Ok(ConnectionHandle::new(SourceKind::Link))
    }

    async fn scan(&self, _handle: &ConnectionHandle, _cancel: CancellationToken) -> Result<ScanStream> {
        Ok(stream::empty().boxed())
    }
}
