//! Key-Value Archive backed by one file per key

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    storage::{ArchiveStore, FileSystemAccess},
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Archive store writing each key as `<dir>/<key>.json`.
///
/// Values are stored verbatim; callers put JSON documents in them. The
/// directory is created lazily on first write.
pub struct JsonFileArchive {
    fs: Arc<dyn FileSystemAccess>,
    dir: PathBuf,
}

impl JsonFileArchive {
    pub fn new(fs: Arc<dyn FileSystemAccess>, dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            dir: dir.into(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        debug_assert!(
            !key.contains(['/', '\\']),
            "archive keys must not contain path separators"
        );
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl ArchiveStore for JsonFileArchive {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.key_path(key);
        if !self.fs.exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(self.fs.read_file(&path).await?))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<()> {
        self.fs.create_dir_all(&self.dir).await?;
        let path = self.key_path(key);
        debug!(key, bytes = value.len(), "archiving value");
        self.fs.write_file(&path, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if self.fs.exists(&path).await? {
            self.fs.delete_file(&path).await?;
        }
        Ok(())
    }
}
