//! Desktop bridges for macOS, Windows and Linux.
//!
//! [`ReqwestHttpClient`] performs one attempt per request over a pooled
//! rustls client and enforces per-request body limits. [`TokioFileSystem`]
//! gives the local import source read access through `tokio::fs`.
//!
//! `core-runtime` installs both as defaults when its `desktop-shims` feature
//! is on, so most hosts never construct them directly:
//!
//! ```ignore
//! use std::sync::Arc;
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::with_timeout(Duration::from_secs(10))))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .build()?;
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
