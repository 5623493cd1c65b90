//! # Download Coordinator
//!
//! Manages the background transfer of one media file per record.
//!
//! ## Workflow
//!
//! 1. `start_download` validates the track URL (file name + extension),
//!    records the derived local file name on the record immediately, and
//!    spawns the transfer task.
//! 2. The transfer streams through the HTTP bridge; progress callbacks are
//!    relayed to the record and the event bus at a throttled rate.
//! 3. Completion, failure and cancellation each produce exactly one
//!    terminal event; no progress is reported after it.
//!
//! Every start mints a [`TransferTicket`]. Callbacks carry their ticket
//! and are discarded once the coordinator's active ticket for the record
//! no longer matches, so a superseded or cancelled transfer can never act
//! on the record again.

use crate::error::{Result, TransferError};
use bridge_traits::{DownloadObserver, FileSystemAccess, HttpClient};
use core_catalog::{RecordId, SharedRecord, Track};
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

// ============================================================================
// Ticket & Config
// ============================================================================

/// Unique identifier of one transfer attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferTicket(Uuid);

impl TransferTicket {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TransferTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Download coordinator configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Directory downloaded media files are stored in.
    pub media_dir: PathBuf,
    /// Minimum interval between forwarded progress events per record. The
    /// terminal `1.0` fraction is always forwarded.
    pub progress_interval: Duration,
}

// ============================================================================
// Coordinator
// ============================================================================

struct ActiveTransfer {
    ticket: TransferTicket,
    cancel: CancellationToken,
    record: SharedRecord,
    fraction: Option<f32>,
    last_emit: Option<Instant>,
}

type ActiveMap = Arc<Mutex<HashMap<RecordId, ActiveTransfer>>>;

/// Coordinates at most one background download per record.
pub struct DownloadCoordinator {
    http: Arc<dyn HttpClient>,
    fs: Arc<dyn FileSystemAccess>,
    bus: EventBus,
    config: TransferConfig,
    active: ActiveMap,
}

impl DownloadCoordinator {
    pub fn new(
        http: Arc<dyn HttpClient>,
        fs: Arc<dyn FileSystemAccess>,
        bus: EventBus,
        config: TransferConfig,
    ) -> Self {
        Self {
            http,
            fs,
            bus,
            config,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start downloading `track` for `record`.
    ///
    /// The local file name is derived from the URL's last path component
    /// and recorded on the record before the transfer completes, so a
    /// later existence check can detect partial state.
    ///
    /// # Errors
    ///
    /// - [`TransferError::MissingFileName`] / [`MissingFileExtension`]
    ///   when the URL cannot name a local file (configuration error,
    ///   nothing is started)
    /// - [`TransferError::AlreadyDownloading`] when a transfer for this
    ///   record is still active; starting one is a programmer error and
    ///   asserted against in debug builds
    ///
    /// [`MissingFileExtension`]: TransferError::MissingFileExtension
    pub fn start_download(&self, record: &SharedRecord, track: &Track) -> Result<TransferTicket> {
        let file_name = derive_file_name(&track.url).inspect_err(|err| {
            error!(url = %track.url, %err, "refusing download with unusable URL");
        })?;
        let record_id = record.read().id;

        let (ticket, cancel) = {
            let mut active = self.active.lock();
            if active.contains_key(&record_id) {
                debug_assert!(false, "download already active for record {record_id}");
                error!(record = %record_id, "download already active");
                return Err(TransferError::AlreadyDownloading(record_id));
            }
            let ticket = TransferTicket::new();
            let cancel = CancellationToken::new();
            active.insert(
                record_id,
                ActiveTransfer {
                    ticket,
                    cancel: cancel.clone(),
                    record: record.clone(),
                    fraction: None,
                    last_emit: None,
                },
            );
            (ticket, cancel)
        };

        record.write().begin_download(file_name.clone());
        info!(record = %record_id, file = %file_name, %ticket, "download started");
        self.emit(DownloadEvent::Started {
            record_id: record_id.as_u64(),
            file_name: file_name.clone(),
        });

        let destination = self.local_path(&file_name);
        let http = Arc::clone(&self.http);
        let fs = Arc::clone(&self.fs);
        let bus = self.bus.clone();
        let active = Arc::clone(&self.active);
        let record = Arc::clone(record);
        let url = track.url.clone();
        let media_dir = self.config.media_dir.clone();
        let relay = Arc::new(ProgressRelay {
            record_id,
            ticket,
            active: Arc::clone(&self.active),
            bus: self.bus.clone(),
            interval: self.config.progress_interval,
        });

        tokio::spawn(async move {
            let result = async {
                fs.create_dir_all(&media_dir).await?;
                http.download_file(url, destination, relay, cancel).await
            }
            .await;
            finish_transfer(record_id, ticket, &active, &bus, &record, result);
        });

        Ok(ticket)
    }

    /// Cancel the transfer for `record_id`, if one is active.
    ///
    /// Safe to call either way: clears progress state and releases the
    /// transfer handle. The partially-downloaded file is NOT deleted here;
    /// [`remove_local_file`](Self::remove_local_file) is the explicit
    /// deletion used by playlist removal. No progress is reported after
    /// this returns.
    pub fn cancel_download(&self, record_id: RecordId) {
        let entry = self.active.lock().remove(&record_id);
        let Some(entry) = entry else {
            debug!(record = %record_id, "cancel with no active transfer");
            return;
        };
        entry.cancel.cancel();
        entry.record.write().finish_download();
        info!(record = %record_id, ticket = %entry.ticket, "download cancelled");
        self.emit(DownloadEvent::Cancelled {
            record_id: record_id.as_u64(),
        });
    }

    /// `true` while a transfer for `record_id` is active.
    pub fn is_downloading(&self, record_id: RecordId) -> bool {
        self.active.lock().contains_key(&record_id)
    }

    /// Fraction completed for an active transfer, when the server
    /// announced a content length.
    pub fn progress(&self, record_id: RecordId) -> Option<f32> {
        self.active
            .lock()
            .get(&record_id)
            .and_then(|entry| entry.fraction)
    }

    /// Where a file with `file_name` lives in the media directory.
    pub fn local_path(&self, file_name: &str) -> PathBuf {
        self.config.media_dir.join(file_name)
    }

    /// Whether the record's media is actually present on disk. A recorded
    /// file name alone is not enough: a cancelled or failed transfer
    /// leaves the name without the file.
    pub async fn is_stored_locally(&self, record: &SharedRecord) -> bool {
        let Some(name) = record.read().local_file_name().map(str::to_string) else {
            return false;
        };
        let path = self.local_path(&name);
        match self.fs.exists(&path).await {
            Ok(present) => present,
            Err(err) => {
                warn!(path = %path.display(), %err, "existence check failed");
                false
            }
        }
    }

    /// Delete the record's local media copy, if present, and forget its
    /// file name. Invoked by playlist removal, never by cancellation.
    pub async fn remove_local_file(&self, record: &SharedRecord) -> Result<()> {
        let Some(name) = record.read().local_file_name().map(str::to_string) else {
            return Ok(());
        };
        let path = self.local_path(&name);
        if self.fs.exists(&path).await? {
            self.fs.delete_file(&path).await?;
            debug!(path = %path.display(), "local copy deleted");
        }
        record.write().clear_local_file();
        Ok(())
    }

    fn emit(&self, event: DownloadEvent) {
        self.bus.emit(CoreEvent::Download(event)).ok();
    }
}

// ============================================================================
// Progress relay
// ============================================================================

/// Forwards transfer callbacks onto the record and the event bus, dropping
/// anything from a transfer that is no longer the active one.
struct ProgressRelay {
    record_id: RecordId,
    ticket: TransferTicket,
    active: ActiveMap,
    bus: EventBus,
    interval: Duration,
}

impl DownloadObserver for ProgressRelay {
    fn transferred(&self, bytes_written: u64, bytes_total: Option<u64>) {
        // Without a total there is no meaningful fraction; the record
        // keeps progress absent and the UI shows indeterminate activity.
        let Some(total) = bytes_total.filter(|total| *total > 0) else {
            return;
        };
        let fraction = (bytes_written as f64 / total as f64).clamp(0.0, 1.0) as f32;

        let mut active = self.active.lock();
        let Some(entry) = active.get_mut(&self.record_id) else {
            return; // cancelled or completed
        };
        if entry.ticket != self.ticket {
            return; // stale callback from a superseded transfer
        }
        if entry.fraction.is_some_and(|last| fraction < last) {
            return; // progress never runs backwards
        }

        entry.fraction = Some(fraction);
        entry.record.write().set_download_progress(fraction);

        let now = Instant::now();
        let due = entry
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        let emit = due || fraction >= 1.0;
        if emit {
            entry.last_emit = Some(now);
        }
        drop(active);

        if emit {
            self.bus
                .emit(CoreEvent::Download(DownloadEvent::Progress {
                    record_id: self.record_id.as_u64(),
                    fraction,
                }))
                .ok();
        }
    }
}

/// Settle a finished transfer task. The active entry is removed only when
/// the ticket still matches; a cancelled transfer was already settled by
/// `cancel_download` and stays silent here.
fn finish_transfer(
    record_id: RecordId,
    ticket: TransferTicket,
    active: &ActiveMap,
    bus: &EventBus,
    record: &SharedRecord,
    result: bridge_traits::error::Result<()>,
) {
    {
        let mut active = active.lock();
        match active.get(&record_id) {
            Some(entry) if entry.ticket == ticket => {
                active.remove(&record_id);
            }
            _ => return,
        }
    }

    record.write().finish_download();

    match result {
        Ok(()) => {
            info!(record = %record_id, "download complete");
            bus.emit(CoreEvent::Download(DownloadEvent::Completed {
                record_id: record_id.as_u64(),
            }))
            .ok();
        }
        Err(err) if err.is_cancelled() => {
            // The token fired before cancel_download cleaned the map up;
            // cancellation is a silent no-op either way.
            debug!(record = %record_id, "transfer ended by cancellation");
        }
        Err(err) => {
            warn!(record = %record_id, %err, "download failed");
            bus.emit(CoreEvent::Download(DownloadEvent::Failed {
                record_id: record_id.as_u64(),
                message: err.to_string(),
            }))
            .ok();
        }
    }
}

/// Derive the local file name from the URL's last path component.
fn derive_file_name(url: &Url) -> Result<String> {
    let name = url
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or("");
    if name.is_empty() {
        return Err(TransferError::MissingFileName(url.clone()));
    }
    let has_extension = Path::new(name)
        .extension()
        .is_some_and(|ext| !ext.is_empty());
    if !has_extension {
        return Err(TransferError::MissingFileExtension(url.clone()));
    }
    Ok(name.to_string())
}
