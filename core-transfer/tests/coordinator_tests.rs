//! Integration tests for the download coordinator: the full progress /
//! completion / cancellation / failure event surface, against scripted
//! transport and file-system doubles.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{DownloadObserver, FileSystemAccess, HttpClient, TransportError};
use bytes::Bytes;
use core_catalog::{shared, Record, RecordId, SharedRecord, Track};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use core_transfer::{DownloadCoordinator, TransferConfig, TransferError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

// ============================================================================
// Doubles
// ============================================================================

/// In-memory file system double.
#[derive(Default)]
struct FakeFs {
    files: Mutex<HashMap<PathBuf, Bytes>>,
    dirs: Mutex<HashSet<PathBuf>>,
}

impl FakeFs {
    fn mark_written(&self, path: &Path) {
        self.files
            .lock()
            .insert(path.to_path_buf(), Bytes::from_static(b"mp3"));
    }

    fn has(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }
}

#[async_trait]
impl FileSystemAccess for FakeFs {
    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.dirs.lock().insert(path.to_path_buf());
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| BridgeError::OperationFailed(format!("missing {}", path.display())))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.files.lock().insert(path.to_path_buf(), data);
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::OperationFailed(format!("missing {}", path.display())))
    }
}

/// Transport double driving the observer through a scripted byte sequence.
struct ScriptedHttp {
    steps: Vec<(u64, Option<u64>)>,
    fail_with: Option<String>,
    fs: Option<Arc<FakeFs>>,
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn get(&self, _url: Url) -> std::result::Result<Bytes, TransportError> {
        panic!("GET not expected in coordinator tests");
    }

    async fn download_file(
        &self,
        _url: Url,
        destination: PathBuf,
        observer: Arc<dyn DownloadObserver>,
        _cancel: CancellationToken,
    ) -> BridgeResult<()> {
        for (written, total) in &self.steps {
            observer.transferred(*written, *total);
        }
        match &self.fail_with {
            None => {
                if let Some(fs) = &self.fs {
                    fs.mark_written(&destination);
                }
                Ok(())
            }
            Some(message) => Err(BridgeError::OperationFailed(message.clone())),
        }
    }
}

/// Transport double that keeps transferring until cancelled, then reports
/// one more (stale) progress callback.
struct HangingHttp;

#[async_trait]
impl HttpClient for HangingHttp {
    async fn get(&self, _url: Url) -> std::result::Result<Bytes, TransportError> {
        panic!("GET not expected in coordinator tests");
    }

    async fn download_file(
        &self,
        _url: Url,
        _destination: PathBuf,
        observer: Arc<dyn DownloadObserver>,
        cancel: CancellationToken,
    ) -> BridgeResult<()> {
        observer.transferred(10, Some(100));
        cancel.cancelled().await;
        // Late callback from the dying transfer; must be discarded.
        observer.transferred(90, Some(100));
        Err(TransportError::Cancelled.into())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn track(url: &str) -> Track {
    Track {
        id: 1,
        bitrate: "168kbps".to_string(),
        channels: "Stereo".to_string(),
        mode: "VBR".to_string(),
        size: 100,
        url: Url::parse(url).unwrap(),
    }
}

fn record(id: u64) -> SharedRecord {
    shared(Record::new(RecordId::new(id), "Author", "Title", None, ""))
}

fn coordinator(http: Arc<dyn HttpClient>, fs: Arc<FakeFs>, bus: EventBus) -> DownloadCoordinator {
    DownloadCoordinator::new(
        http,
        fs,
        bus,
        TransferConfig {
            media_dir: PathBuf::from("/media"),
            progress_interval: Duration::ZERO,
        },
    )
}

async fn next_download_event(
    subscriber: &mut core_runtime::events::Receiver<CoreEvent>,
) -> DownloadEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), subscriber.recv())
            .await
            .expect("timed out waiting for download event")
            .expect("event bus closed");
        if let CoreEvent::Download(download) = event {
            return download;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_scenario_progress_completion_and_local_storage() {
    let fs = Arc::new(FakeFs::default());
    let http = Arc::new(ScriptedHttp {
        steps: vec![(10, Some(100)), (50, Some(100)), (100, Some(100))],
        fail_with: None,
        fs: Some(fs.clone()),
    });
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(http, fs.clone(), bus);

    let rec = record(42);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();

    // The local name is recorded before the transfer completes.
    assert_eq!(rec.read().local_file_name(), Some("y.mp3"));
    assert!(rec.read().is_downloading());

    assert_eq!(
        next_download_event(&mut events).await,
        DownloadEvent::Started {
            record_id: 42,
            file_name: "y.mp3".to_string()
        }
    );

    let mut fractions = Vec::new();
    loop {
        match next_download_event(&mut events).await {
            DownloadEvent::Progress { fraction, .. } => fractions.push(fraction),
            DownloadEvent::Completed { record_id } => {
                assert_eq!(record_id, 42);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(fractions, vec![0.1, 0.5, 1.0]);

    // Terminal state: no longer downloading, file present on disk.
    assert!(!coordinator.is_downloading(RecordId::new(42)));
    assert!(!rec.read().is_downloading());
    assert!(coordinator.is_stored_locally(&rec).await);
    assert!(fs.has(Path::new("/media/y.mp3")));
}

#[tokio::test]
async fn progress_fractions_never_run_backwards() {
    let fs = Arc::new(FakeFs::default());
    let http = Arc::new(ScriptedHttp {
        steps: vec![(50, Some(100)), (30, Some(100)), (100, Some(100))],
        fail_with: None,
        fs: Some(fs.clone()),
    });
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(http, fs, bus);

    let rec = record(7);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();

    let mut fractions = Vec::new();
    loop {
        match next_download_event(&mut events).await {
            DownloadEvent::Progress { fraction, .. } => fractions.push(fraction),
            DownloadEvent::Completed { .. } => break,
            DownloadEvent::Started { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    // The 0.3 regression is discarded.
    assert_eq!(fractions, vec![0.5, 1.0]);
}

#[tokio::test]
async fn unknown_content_length_yields_no_fractions() {
    let fs = Arc::new(FakeFs::default());
    let http = Arc::new(ScriptedHttp {
        steps: vec![(10, None), (500, None)],
        fail_with: None,
        fs: Some(fs.clone()),
    });
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(http, fs, bus);

    let rec = record(7);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();

    loop {
        match next_download_event(&mut events).await {
            DownloadEvent::Progress { .. } => panic!("no fractions without a total"),
            DownloadEvent::Completed { .. } => break,
            DownloadEvent::Started { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert_eq!(rec.read().download_progress(), None);
}

#[tokio::test]
async fn failed_transfer_reports_failure_not_completion() {
    let fs = Arc::new(FakeFs::default());
    let http = Arc::new(ScriptedHttp {
        steps: vec![(10, Some(100))],
        fail_with: Some("could not move downloaded file into place".to_string()),
        fs: None,
    });
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(http, fs, bus);

    let rec = record(9);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();

    loop {
        match next_download_event(&mut events).await {
            DownloadEvent::Failed { record_id, message } => {
                assert_eq!(record_id, 9);
                assert!(message.contains("move"));
                break;
            }
            DownloadEvent::Completed { .. } => panic!("failure must not complete"),
            DownloadEvent::Started { .. } | DownloadEvent::Progress { .. } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }

    let rec = rec.read();
    assert!(!rec.is_downloading());
    // The name stays recorded; the file is simply not there.
    assert_eq!(rec.local_file_name(), Some("y.mp3"));
}

#[tokio::test]
async fn cancellation_discards_late_progress() {
    let fs = Arc::new(FakeFs::default());
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(Arc::new(HangingHttp), fs, bus);

    let rec = record(5);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();

    // Wait until the transfer is observably under way.
    loop {
        if let DownloadEvent::Progress { fraction, .. } = next_download_event(&mut events).await {
            assert_eq!(fraction, 0.1);
            break;
        }
    }

    coordinator.cancel_download(RecordId::new(5));
    assert!(!coordinator.is_downloading(RecordId::new(5)));
    assert_eq!(coordinator.progress(RecordId::new(5)), None);
    assert!(!rec.read().is_downloading());

    // The one remaining event is the cancellation; the late 0.9 progress
    // from the dying transfer never surfaces.
    assert_eq!(
        next_download_event(&mut events).await,
        DownloadEvent::Cancelled { record_id: 5 }
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    match events.try_recv() {
        Err(tokio::sync::broadcast::error::TryRecvError::Empty) => {}
        other => panic!("expected no further events, got {other:?}"),
    }
    assert_eq!(rec.read().download_progress(), None);
}

#[tokio::test]
async fn cancel_without_active_transfer_is_safe() {
    let fs = Arc::new(FakeFs::default());
    let coordinator = coordinator(Arc::new(HangingHttp), fs, EventBus::new(8));
    coordinator.cancel_download(RecordId::new(404));
    assert!(!coordinator.is_downloading(RecordId::new(404)));
}

#[tokio::test]
async fn url_without_extension_is_a_configuration_error() {
    let fs = Arc::new(FakeFs::default());
    let coordinator = coordinator(Arc::new(HangingHttp), fs, EventBus::new(8));

    let rec = record(3);
    let err = coordinator
        .start_download(&rec, &track("http://x/tracks"))
        .unwrap_err();
    assert!(matches!(err, TransferError::MissingFileExtension(_)));

    // Nothing was started or recorded.
    assert!(!coordinator.is_downloading(RecordId::new(3)));
    assert_eq!(rec.read().local_file_name(), None);
}

#[tokio::test]
#[should_panic(expected = "download already active")]
async fn duplicate_start_is_asserted_against() {
    let fs = Arc::new(FakeFs::default());
    let coordinator = coordinator(Arc::new(HangingHttp), fs, EventBus::new(8));

    let rec = record(6);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();
    // Second start for the same record is a programmer error.
    let _ = coordinator.start_download(&rec, &track("http://x/y.mp3"));
}

#[tokio::test]
async fn remove_local_file_deletes_and_forgets() {
    let fs = Arc::new(FakeFs::default());
    let http = Arc::new(ScriptedHttp {
        steps: vec![(100, Some(100))],
        fail_with: None,
        fs: Some(fs.clone()),
    });
    let bus = EventBus::new(32);
    let mut events = bus.subscribe();
    let coordinator = coordinator(http, fs.clone(), bus);

    let rec = record(8);
    coordinator
        .start_download(&rec, &track("http://x/y.mp3"))
        .unwrap();
    loop {
        if let DownloadEvent::Completed { .. } = next_download_event(&mut events).await {
            break;
        }
    }
    assert!(coordinator.is_stored_locally(&rec).await);

    coordinator.remove_local_file(&rec).await.unwrap();
    assert!(!fs.has(Path::new("/media/y.mp3")));
    assert_eq!(rec.read().local_file_name(), None);
    assert!(!coordinator.is_stored_locally(&rec).await);

    // Idempotent once the name is gone.
    coordinator.remove_local_file(&rec).await.unwrap();
}
