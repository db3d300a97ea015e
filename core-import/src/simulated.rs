//! Simulated paired device / cloud account.
//!
//! Stands in for real hardware with a fixed handshake delay and a
//! timer-driven scan. Items are revealed once progress reaches 100.

use crate::progress::{ProgressConfig, ProgressSimulator};
use crate::source::{ConnectionHandle, ScanStream, ScanUpdate, SourceConnector};
use crate::types::{DiscoveredItem, SourceKind};
use crate::{ImportError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub struct SimulatedCloudConnector {
    kind: SourceKind,
    label: String,
    connect_delay: Duration,
    progress: ProgressSimulator,
    items: Vec<DiscoveredItem>,
}

impl SimulatedCloudConnector {
    pub fn new(
        kind: SourceKind,
        connect_delay: Duration,
        progress: ProgressConfig,
        items: Vec<DiscoveredItem>,
    ) -> Result<Self> {
        Ok(Self {
            kind,
            label: format!("Simulated {}", kind.display_name()),
            connect_delay,
            progress: ProgressSimulator::new(progress)?,
            items,
        })
    }

    /// `count` placeholder photos named `IMG_0001.jpg`, `IMG_0002.jpg`, ...
    pub fn sample_items(count: usize) -> Vec<DiscoveredItem> {
        (1..=count)
            .map(|n| {
                let name = format!("IMG_{n:04}.jpg");
                DiscoveredItem::new(
                    format!("sim-{n:04}"),
                    name.clone(),
                    format!("sim://device/{name}"),
                )
                .with_mime_type("image/jpeg")
            })
            .collect()
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

#[async_trait]
impl SourceConnector for SimulatedCloudConnector {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    #[instrument(skip(self, cancel), fields(source = %self.kind))]
    async fn connect(&self, cancel: &CancellationToken) -> Result<ConnectionHandle> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ImportError::Cancelled),
            _ = tokio::time::sleep(self.connect_delay) => {
                debug!("Simulated handshake complete");
                Ok(ConnectionHandle::new(self.kind).with_label(self.label.clone()))
            }
        }
    }

    async fn scan(&self, _handle: &ConnectionHandle, cancel: CancellationToken) -> Result<ScanStream> {
        let progress = self
            .progress
            .ticks()
            .map(|value| Ok(ScanUpdate::Progress(value)));
        let items = stream::iter(
            self.items
                .clone()
                .into_iter()
                .map(|item| Ok(ScanUpdate::Discovered(item))),
        );

        Ok(progress
            .chain(items)
            .take_until(cancel.cancelled_owned())
            .boxed())
    }
}
