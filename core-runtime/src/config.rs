//! # Core Configuration Module
//!
//! Configuration for the client core, constructed through a builder with
//! fail-fast validation: every platform bridge must be provided before the
//! core initializes, so a misconfigured host fails at startup with an
//! actionable message instead of panicking mid-flight.
//!
//! ## Required bridges
//!
//! - `HttpClient` — catalog/manifest fetches and file downloads
//! - `FileSystemAccess` — local media bookkeeping
//! - `ArchiveStore` — durable record set + playlist membership
//! - `MediaEngine` — the native player backing playback sessions
//! - `AccessTokenProvider` — per-request catalog API tokens
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_dir("/data/mds/media")
//!     .http_client(http)
//!     .file_system(fs)
//!     .archive(archive)
//!     .media_engine(engine)
//!     .token_provider(tokens)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AccessTokenProvider, ArchiveStore, FileSystemAccess, HttpClient, MediaEngine, RetryPolicy,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default base endpoint for catalog records. Manifest URLs are derived
/// from it as `<endpoint>/<record-id>/tracks/`.
pub const DEFAULT_RECORDS_ENDPOINT: &str = "http://core.mds-club.ru/api/v1.0/mds/records";

/// Default throttle for download progress events.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

/// Default period of the playback time-report timer.
pub const DEFAULT_TIME_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Core configuration for the client.
///
/// Use [`CoreConfig::builder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base endpoint for catalog records.
    pub records_endpoint: String,

    /// Directory downloaded media files are stored in.
    pub media_dir: PathBuf,

    /// Retry policy for manifest resolution.
    pub resolve_retry: RetryPolicy,

    /// Minimum interval between download progress events per record.
    pub progress_interval: Duration,

    /// Period of the playback time-report timer.
    pub time_report_interval: Duration,

    /// Event bus buffer capacity.
    pub event_capacity: usize,

    /// HTTP transport bridge.
    pub http_client: Arc<dyn HttpClient>,

    /// File system bridge.
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Durable key-value archive bridge.
    pub archive: Arc<dyn ArchiveStore>,

    /// Native media engine bridge.
    pub media_engine: Arc<dyn MediaEngine>,

    /// Catalog access-token generation bridge.
    pub token_provider: Arc<dyn AccessTokenProvider>,
}

impl CoreConfig {
    /// Start building a configuration.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("records_endpoint", &self.records_endpoint)
            .field("media_dir", &self.media_dir)
            .field("resolve_retry", &self.resolve_retry)
            .field("progress_interval", &self.progress_interval)
            .field("time_report_interval", &self.time_report_interval)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    records_endpoint: Option<String>,
    media_dir: Option<PathBuf>,
    resolve_retry: Option<RetryPolicy>,
    progress_interval: Option<Duration>,
    time_report_interval: Option<Duration>,
    event_capacity: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    archive: Option<Arc<dyn ArchiveStore>>,
    media_engine: Option<Arc<dyn MediaEngine>>,
    token_provider: Option<Arc<dyn AccessTokenProvider>>,
}

impl CoreConfigBuilder {
    /// Override the catalog records endpoint.
    pub fn records_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.records_endpoint = Some(endpoint.into());
        self
    }

    /// Set the directory downloaded media is stored in.
    pub fn media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = Some(dir.into());
        self
    }

    /// Override the manifest resolution retry policy.
    pub fn resolve_retry(mut self, policy: RetryPolicy) -> Self {
        self.resolve_retry = Some(policy);
        self
    }

    /// Override the progress-event throttle interval.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    /// Override the playback time-report period.
    pub fn time_report_interval(mut self, interval: Duration) -> Self {
        self.time_report_interval = Some(interval);
        self
    }

    /// Override the event bus capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    /// Provide the HTTP transport bridge.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Provide the file system bridge.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Provide the durable archive bridge.
    pub fn archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Provide the native media engine bridge.
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    /// Provide the access-token bridge.
    pub fn token_provider(mut self, provider: Arc<dyn AccessTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] naming the first absent bridge,
    /// or [`Error::Config`] for invalid tunables.
    pub fn build(self) -> Result<CoreConfig> {
        let http_client = self.http_client.ok_or_else(|| missing("HttpClient"))?;
        let file_system = self.file_system.ok_or_else(|| missing("FileSystemAccess"))?;
        let archive = self.archive.ok_or_else(|| missing("ArchiveStore"))?;
        let media_engine = self.media_engine.ok_or_else(|| missing("MediaEngine"))?;
        let token_provider = self
            .token_provider
            .ok_or_else(|| missing("AccessTokenProvider"))?;

        let media_dir = self
            .media_dir
            .ok_or_else(|| Error::Config("media_dir is required".to_string()))?;

        let event_capacity = self.event_capacity.unwrap_or(100);
        if event_capacity == 0 {
            return Err(Error::Config(
                "event_capacity must be greater than zero".to_string(),
            ));
        }

        Ok(CoreConfig {
            records_endpoint: self
                .records_endpoint
                .unwrap_or_else(|| DEFAULT_RECORDS_ENDPOINT.to_string()),
            media_dir,
            resolve_retry: self.resolve_retry.unwrap_or_default(),
            progress_interval: self.progress_interval.unwrap_or(DEFAULT_PROGRESS_INTERVAL),
            time_report_interval: self
                .time_report_interval
                .unwrap_or(DEFAULT_TIME_REPORT_INTERVAL),
            event_capacity,
            http_client,
            file_system,
            archive,
            media_engine,
            token_provider,
        })
    }
}

fn missing(capability: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!("provide an Arc<dyn {capability}> before calling build()"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult, http::TransportError, media::MediaSession,
        DownloadObserver, StaticTokenProvider,
    };
    use bytes::Bytes;
    use std::path::Path;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    struct StubHttp;

    #[async_trait]
    impl HttpClient for StubHttp {
        async fn get(&self, _url: Url) -> std::result::Result<Bytes, TransportError> {
            Err(TransportError::NoResponse)
        }

        async fn download_file(
            &self,
            _url: Url,
            _destination: PathBuf,
            _observer: Arc<dyn DownloadObserver>,
            _cancel: CancellationToken,
        ) -> BridgeResult<()> {
            Err(TransportError::NoResponse.into())
        }
    }

    struct StubFs;

    #[async_trait]
    impl FileSystemAccess for StubFs {
        async fn exists(&self, _path: &Path) -> BridgeResult<bool> {
            Ok(false)
        }
        async fn create_dir_all(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
        async fn read_file(&self, _path: &Path) -> BridgeResult<Bytes> {
            Ok(Bytes::new())
        }
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn delete_file(&self, _path: &Path) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct StubArchive;

    #[async_trait]
    impl ArchiveStore for StubArchive {
        async fn get(&self, _key: &str) -> BridgeResult<Option<Bytes>> {
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: Bytes) -> BridgeResult<()> {
            Ok(())
        }
        async fn remove(&self, _key: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct StubEngine;

    #[async_trait]
    impl MediaEngine for StubEngine {
        async fn open(&self, _url: Url) -> BridgeResult<Arc<dyn MediaSession>> {
            Err(bridge_traits::BridgeError::NotAvailable(
                "no media engine in tests".to_string(),
            ))
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .media_dir("/tmp/mds-media")
            .http_client(Arc::new(StubHttp))
            .file_system(Arc::new(StubFs))
            .archive(Arc::new(StubArchive))
            .media_engine(Arc::new(StubEngine))
            .token_provider(Arc::new(StaticTokenProvider::new("tok")))
    }

    #[test]
    fn build_succeeds_with_all_bridges() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.records_endpoint, DEFAULT_RECORDS_ENDPOINT);
        assert_eq!(config.media_dir, PathBuf::from("/tmp/mds-media"));
        assert_eq!(config.resolve_retry.max_retries, 3);
        assert_eq!(config.progress_interval, DEFAULT_PROGRESS_INTERVAL);
        assert_eq!(config.event_capacity, 100);
    }

    #[test]
    fn build_fails_without_http_client() {
        let result = CoreConfig::builder()
            .media_dir("/tmp/mds-media")
            .file_system(Arc::new(StubFs))
            .archive(Arc::new(StubArchive))
            .media_engine(Arc::new(StubEngine))
            .token_provider(Arc::new(StaticTokenProvider::new("tok")))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient");
            }
            other => panic!("expected CapabilityMissing, got {other:?}"),
        }
    }

    #[test]
    fn build_fails_without_media_dir() {
        let result = complete_builder();
        let result = CoreConfigBuilder {
            media_dir: None,
            ..result
        }
        .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn build_rejects_zero_event_capacity() {
        let result = complete_builder().event_capacity(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn tunables_can_be_overridden() {
        let config = complete_builder()
            .records_endpoint("http://localhost:9999/records")
            .resolve_retry(RetryPolicy {
                max_retries: 1,
                delay: Duration::from_millis(10),
            })
            .progress_interval(Duration::from_millis(50))
            .time_report_interval(Duration::from_millis(500))
            .event_capacity(16)
            .build()
            .unwrap();

        assert_eq!(config.records_endpoint, "http://localhost:9999/records");
        assert_eq!(config.resolve_retry.max_retries, 1);
        assert_eq!(config.progress_interval, Duration::from_millis(50));
        assert_eq!(config.time_report_interval, Duration::from_millis(500));
        assert_eq!(config.event_capacity, 16);
    }
}
