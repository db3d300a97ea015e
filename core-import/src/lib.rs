//! # Import Core
//!
//! Moves media from an external source into the asset library.
//!
//! ## Overview
//!
//! An import is a [`TransferSession`] that walks a validated state machine:
//! connect to the source, scan it for images, let the user pick a subset, then
//! finalize that subset into [`AssetItem`] records. The [`ImportCoordinator`]
//! owns the session and runs the asynchronous steps with cancellation.
//!
//! ## Components
//!
//! - **Transfer Session** (`session`): status machine, progress and discovered items
//! - **Progress Simulator** (`progress`): fixed-tick progress for simulated sources
//! - **Selection Set** (`selection`): toggle-one / toggle-all over discovered items
//! - **Import Finalizer** (`finalizer`): all-or-nothing conversion into assets
//! - **Source Registry** (`source`): source descriptors and the [`SourceConnector`] seam
//! - **Connectors**: local folder (`local`), simulated device (`simulated`), direct link (`link`)
//! - **Coordinator** (`coordinator`): orchestration, events and stale-run protection

pub mod coordinator;
pub mod error;
pub mod finalizer;
pub mod link;
pub mod local;
pub mod progress;
pub mod selection;
pub mod session;
pub mod simulated;
pub mod source;
pub mod types;

pub use coordinator::{ImportConfig, ImportCoordinator};
pub use error::{ImportError, Result};
pub use finalizer::{AssetSink, ImportFinalizer, ImportTarget, ImportedAsset, InMemoryAssetLibrary};
pub use link::{HttpLinkProbe, LinkConnector, LinkImport, LinkProbe, LinkStatus, ProbedImage};
pub use local::LocalFolderConnector;
pub use progress::{ProgressConfig, ProgressOutcome, ProgressSimulator, ProgressTick, ProgressTicker};
pub use selection::SelectionSet;
pub use session::{SessionId, SessionStatus, TransferSession};
pub use simulated::SimulatedCloudConnector;
pub use source::{
    cancellable, ConnectionHandle, FetchedAsset, ImportSource, ScanStream, ScanUpdate,
    SourceConnector, SourceRegistry,
};
pub use types::{
    AssetId, AssetItem, Classification, DiscoveredItem, Folder, FolderId, ItemId, SourceKind,
};
