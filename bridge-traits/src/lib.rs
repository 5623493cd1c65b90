//! # Platform Bridge Traits
//!
//! Platform-agnostic abstractions the client core reaches the outside world
//! through:
//! - HTTP transport (catalog fetches, observed file downloads)
//! - File system access
//! - Key-value archive for durable client state
//! - Native media engine (the single active playback session)
//! - Access-token generation for the catalog API
//!
//! Host applications provide concrete implementations that satisfy their
//! platform constraints (desktop, mobile); tests inject doubles.

pub mod auth;
pub mod error;
pub mod http;
pub mod media;
pub mod storage;

pub use auth::{AccessTokenProvider, StaticTokenProvider};
pub use error::{BridgeError, Result};
pub use http::{DownloadObserver, HttpClient, RetryPolicy, TransportError};
pub use media::{MediaEngine, MediaSession, ReadySignal};
pub use storage::{ArchiveStore, FileSystemAccess};
