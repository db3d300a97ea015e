//! # Host Bridge Traits
//!
//! The seams between the import core and the machine it runs on. The core
//! never opens a socket or a file itself; it asks an implementation of one of
//! these traits, which keeps every import source testable with fakes.
//!
//! | Trait | Used by |
//! |-------|---------|
//! | [`HttpClient`](http::HttpClient) | link probing, OAuth token exchange, Drive API |
//! | [`FileSystemAccess`](storage::FileSystemAccess) | the local folder source |
//! | [`StorageProvider`](storage::StorageProvider) | cloud drive sources |
//! | [`Clock`](time::Clock) | asset timestamps, token expiry |
//! | [`LoggerSink`](time::LoggerSink) | mirroring logs into the host |
//!
//! Every trait is `Send + Sync` and is shared behind an `Arc`. Failures are
//! reported as [`BridgeError`]; implementations put the path or HTTP status
//! in the message.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileMetadata, FileSystemAccess, RemoteAccount, RemoteFile, StorageProvider};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
