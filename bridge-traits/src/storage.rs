//! Storage and File System Abstractions
//!
//! Platform-agnostic traits for file I/O and for the key-value archive that
//! holds durable client state (the record set and playlist membership).

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait.
///
/// Abstracts file operations so download bookkeeping ("is this record
/// stored locally?") and local-copy deletion work against sandboxed app
/// directories on any platform.
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check whether a file exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Create a directory and all parent directories if they don't exist.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file contents into memory.
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to a file, creating or replacing it.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file.
    async fn delete_file(&self, path: &Path) -> Result<()>;
}

/// Key-value archive for durable client state.
///
/// The client stores the full record set under one key and the playlist
/// member ids under another, reloading both at startup. Values are opaque
/// bytes; encoding is the caller's concern.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: Bytes) -> Result<()>;

    /// Remove the value stored under `key`, if present.
    async fn remove(&self, key: &str) -> Result<()>;
}
