//! Umbrella crate for the studio import core.
//!
//! Hosts depend on this crate and pick a feature instead of wiring the
//! workspace crates one by one:
//!
//! - `desktop-shims` (default): [`service`] with reqwest and tokio bridges
//! - `google-drive`: [`service`] with the Drive import source
//! - `import-only`: just the session machinery in [`import`], for hosts that
//!   bring their own connectors and library

#[cfg(any(feature = "desktop-shims", feature = "google-drive"))]
pub use core_service as service;

#[cfg(feature = "import-only")]
pub use core_import as import;
