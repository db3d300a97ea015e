//! # Google Drive Provider
//!
//! Google Drive API v3 client and the Drive import source.
//!
//! ## Overview
//!
//! - [`GoogleDriveConnector`] implements `StorageProvider`: image listing
//!   (newest first, paginated), downloads and account lookup, with bearer
//!   tokens supplied by a `core_auth::TokenProvider`
//! - [`DriveSourceConnector`] implements `core_import::SourceConnector` on top
//!   of any `StorageProvider`
//!
//! Failures reach the import flow as `ImportError::Connection`, which moves
//! the session to `Error` and can be retried.

pub mod connector;
pub mod error;
pub mod source;
pub mod types;

pub use connector::{GoogleDriveConnector, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use error::{GoogleDriveError, Result};
pub use source::{DriveSourceConnector, DEFAULT_MAX_ITEMS};
