//! # Playlist Service
//!
//! The playlist/catalog store. One instance owns:
//! - the record map and the ordered playlist (O(1) membership)
//! - the resolver → download pipeline spawned per playlist addition
//! - the single [`RemotePlayer`] and the id of the record loaded in it
//! - persistence of the record set and playlist membership after every
//!   mutation that changes durable state (failures are logged, never
//!   crash, and never roll back in-memory state)
//!
//! All playlist mutation goes through the service's internal lock, which
//! is the single-writer discipline the rest of the core assumes. UI-visible
//! changes are emitted on the event bus; the host drains it on its main
//! execution context.

use crate::error::{Result, ServiceError};
use bridge_traits::{AccessTokenProvider, HttpClient};
use core_catalog::{
    shared, wire, CatalogError, CatalogRepository, Playlist, Record, RecordId, SharedRecord,
    StoredRecord, TrackResolver,
};
use core_playback::{PlaybackError, PlaybackStatus, PlayerConfig, PlayerObserver, RemotePlayer};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus, PlaybackEvent, Receiver};
use core_transfer::{DownloadCoordinator, TransferConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Forwards player notifications onto the event bus.
struct BusObserver {
    bus: EventBus,
}

impl PlayerObserver for BusObserver {
    fn status_changed(&self, status: PlaybackStatus) {
        self.bus
            .emit(CoreEvent::Playback(PlaybackEvent::StatusChanged {
                status: status.to_string(),
            }))
            .ok();
    }

    fn duration_detected(&self, duration_ms: u64) {
        self.bus
            .emit(CoreEvent::Playback(PlaybackEvent::DurationDetected {
                duration_ms,
            }))
            .ok();
    }

    fn current_time(&self, position_ms: u64) {
        self.bus
            .emit(CoreEvent::Playback(PlaybackEvent::CurrentTime {
                position_ms,
            }))
            .ok();
    }

    fn playback_error(&self, error: &PlaybackError) {
        self.bus
            .emit(CoreEvent::Playback(PlaybackEvent::Error {
                message: error.to_string(),
            }))
            .ok();
    }
}

struct ServiceState {
    records: HashMap<RecordId, SharedRecord>,
    playlist: Playlist,
    playing: Option<RecordId>,
}

/// The playlist/catalog owner coordinating resolver, download coordinator
/// and player per record.
pub struct PlaylistService {
    http: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    records_endpoint: String,
    bus: EventBus,
    resolver: Arc<TrackResolver>,
    downloads: Arc<DownloadCoordinator>,
    player: Arc<RemotePlayer>,
    repository: Arc<CatalogRepository>,
    state: Mutex<ServiceState>,
}

impl PlaylistService {
    /// Build the service and its sub-components from a validated config.
    pub fn new(config: CoreConfig) -> Self {
        let bus = EventBus::new(config.event_capacity);
        let resolver = Arc::new(TrackResolver::new(
            Arc::clone(&config.http_client),
            Arc::clone(&config.token_provider),
            config.records_endpoint.clone(),
            config.resolve_retry,
        ));
        let downloads = Arc::new(DownloadCoordinator::new(
            Arc::clone(&config.http_client),
            Arc::clone(&config.file_system),
            bus.clone(),
            TransferConfig {
                media_dir: config.media_dir.clone(),
                progress_interval: config.progress_interval,
            },
        ));
        let player = Arc::new(RemotePlayer::new(
            Arc::clone(&config.media_engine),
            Arc::new(BusObserver { bus: bus.clone() }),
            PlayerConfig {
                time_report_interval: config.time_report_interval,
            },
        ));
        let repository = Arc::new(CatalogRepository::new(Arc::clone(&config.archive)));

        Self {
            http: config.http_client,
            tokens: config.token_provider,
            records_endpoint: config.records_endpoint,
            bus,
            resolver,
            downloads,
            player,
            repository,
            state: Mutex::new(ServiceState {
                records: HashMap::new(),
                playlist: Playlist::new(),
                playing: None,
            }),
        }
    }

    /// Subscribe to UI-visible events. The host drains the subscription on
    /// its main execution context.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.bus.subscribe()
    }

    /// The player, for direct transport control (seek, volume).
    pub fn player(&self) -> Arc<RemotePlayer> {
        Arc::clone(&self.player)
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Download the remote catalog and replace the record set. Records
    /// already in the playlist keep their live instances.
    ///
    /// Returns the number of records now known. A cancelled fetch is a
    /// silent no-op.
    pub async fn download_catalog(&self) -> Result<usize> {
        let url = self.catalog_url()?;
        let payload = match self.http.get(url).await {
            Ok(payload) => payload,
            Err(err) if err.is_cancelled() => {
                debug!("catalog fetch cancelled");
                return Ok(self.state.lock().records.len());
            }
            Err(err) => return Err(CatalogError::from(err).into()),
        };

        let records = wire::decode_catalog(&payload)?;
        let count = records.len();
        {
            let mut st = self.state.lock();
            let mut map = HashMap::with_capacity(count);
            for record in records {
                let id = record.id;
                if st.playlist.contains(id) {
                    if let Some(existing) = st.records.get(&id) {
                        map.insert(id, Arc::clone(existing));
                        continue;
                    }
                }
                map.insert(id, shared(record));
            }
            // Playlist members missing from the fresh catalog survive the
            // refresh; removal stays an explicit user action.
            for id in st.playlist.ids() {
                if !map.contains_key(id) {
                    if let Some(existing) = st.records.get(id) {
                        map.insert(*id, Arc::clone(existing));
                    }
                }
            }
            st.records = map;
        }

        self.persist().await;
        info!(records = count, "catalog downloaded");
        self.bus
            .emit(CoreEvent::Catalog(CatalogEvent::Refreshed {
                record_count: count,
            }))
            .ok();
        Ok(count)
    }

    /// Number of records currently known.
    pub fn record_count(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Look a record up by id.
    pub fn record(&self, id: RecordId) -> Option<SharedRecord> {
        self.state.lock().records.get(&id).cloned()
    }

    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    /// O(1) playlist membership test.
    pub fn contains(&self, id: RecordId) -> bool {
        self.state.lock().playlist.contains(id)
    }

    /// Playlist member ids in insertion order.
    pub fn playlist(&self) -> Vec<RecordId> {
        self.state.lock().playlist.ids().to_vec()
    }

    /// Add `id` to the playlist and, unless its media is already stored
    /// locally, enter it into the resolve → download pipeline.
    ///
    /// Adding a present member is a programmer error: asserted against in
    /// debug builds, rejected with [`ServiceError::AlreadyInPlaylist`].
    pub async fn add(&self, id: RecordId) -> Result<()> {
        let record = {
            let mut st = self.state.lock();
            let Some(record) = st.records.get(&id).cloned() else {
                return Err(ServiceError::UnknownRecord(id));
            };
            if !st.playlist.insert(id) {
                debug_assert!(false, "record {id} already in playlist");
                error!(record = %id, "record already in playlist");
                return Err(ServiceError::AlreadyInPlaylist(id));
            }
            record
        };

        self.persist().await;
        info!(record = %id, "record added to playlist");
        self.bus
            .emit(CoreEvent::Catalog(CatalogEvent::RecordAdded {
                record_id: id.as_u64(),
            }))
            .ok();

        if !self.downloads.is_stored_locally(&record).await {
            self.spawn_pipeline(record);
        }
        Ok(())
    }

    /// Remove `id` from the playlist: stop it if it is playing, cancel
    /// any in-flight download, delete the local copy, then persist.
    pub async fn remove(&self, id: RecordId) -> Result<()> {
        let record = {
            let st = self.state.lock();
            if !st.playlist.contains(id) {
                return Err(ServiceError::NotInPlaylist(id));
            }
            st.records.get(&id).cloned()
        };

        // The playing record reaches Idle before it leaves the playlist.
        let was_playing = self.state.lock().playing == Some(id);
        if was_playing {
            self.player.stop().await;
            self.state.lock().playing = None;
        }

        self.downloads.cancel_download(id);
        if let Some(record) = &record {
            if let Err(err) = self.downloads.remove_local_file(record).await {
                warn!(record = %id, %err, "local copy deletion failed");
            }
        }

        self.state.lock().playlist.remove(id);
        self.persist().await;
        info!(record = %id, "record removed from playlist");
        self.bus
            .emit(CoreEvent::Catalog(CatalogEvent::RecordRemoved {
                record_id: id.as_u64(),
            }))
            .ok();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Local storage
    // ------------------------------------------------------------------

    /// Whether the record's media file is actually present on disk.
    pub async fn is_stored_locally(&self, id: RecordId) -> bool {
        match self.record(id) {
            Some(record) => self.downloads.is_stored_locally(&record).await,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Reload archived state and reconcile: playlist order is preserved,
    /// unknown ids are dropped, and every restored member whose media is
    /// not on local storage re-enters the download pipeline.
    pub async fn restore(&self) -> Result<()> {
        let Some((stored, ids)) = self.repository.load().await? else {
            debug!("no archived client state");
            return Ok(());
        };

        let mut members = Vec::new();
        {
            let mut st = self.state.lock();
            st.records = stored
                .into_iter()
                .map(|s| {
                    let record: Record = s.into();
                    (record.id, shared(record))
                })
                .collect();
            st.playlist = Playlist::new();
            for id in ids {
                if let Some(record) = st.records.get(&id).cloned() {
                    if st.playlist.insert(id) {
                        members.push(record);
                    }
                } else {
                    warn!(record = %id, "dropping playlist id with no archived record");
                }
            }
        }

        let (record_count, playlist_len) = {
            let st = self.state.lock();
            (st.records.len(), st.playlist.len())
        };
        info!(
            records = record_count,
            playlist = playlist_len,
            "client state restored"
        );
        self.bus
            .emit(CoreEvent::Catalog(CatalogEvent::Restored {
                record_count,
                playlist_len,
            }))
            .ok();

        for record in members {
            if !self.downloads.is_stored_locally(&record).await {
                self.spawn_pipeline(record);
            }
        }
        Ok(())
    }

    /// Archive the record set and playlist. Failures are logged and
    /// tolerated; in-memory state is never rolled back.
    async fn persist(&self) {
        let (records, playlist) = {
            let st = self.state.lock();
            let records: Vec<StoredRecord> = st
                .records
                .values()
                .map(|record| StoredRecord::from(&*record.read()))
                .collect();
            (records, st.playlist.ids().to_vec())
        };
        if let Err(err) = self.repository.store(&records, &playlist).await {
            warn!(%err, "persisting client state failed");
        }
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    /// Resolve the record and start its download, off the caller. A
    /// pipeline already running for the record falls out harmlessly.
    fn spawn_pipeline(&self, record: SharedRecord) {
        let resolver = Arc::clone(&self.resolver);
        let downloads = Arc::clone(&self.downloads);
        let bus = self.bus.clone();

        tokio::spawn(async move {
            let id = record.read().id;
            if downloads.is_downloading(id) {
                return;
            }
            match resolver.resolve(&record).await {
                Ok(track) => {
                    if downloads.is_downloading(id) {
                        return;
                    }
                    if let Err(err) = downloads.start_download(&record, &track) {
                        warn!(record = %id, %err, "download not started");
                    }
                }
                Err(CatalogError::ResolveInFlight) => {
                    debug!(record = %id, "resolution already running");
                }
                Err(err) if err.is_cancelled() => {}
                Err(err) => {
                    if let Some(reason) = err.broken_reason() {
                        bus.emit(CoreEvent::Catalog(CatalogEvent::RecordBroken {
                            record_id: id.as_u64(),
                            reason: reason.to_string(),
                        }))
                        .ok();
                    }
                    warn!(record = %id, %err, "record unavailable");
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Playback facade
    // ------------------------------------------------------------------

    /// Start playing `id` from its local file, replacing any currently
    /// playing record.
    pub async fn play(&self, id: RecordId) -> Result<()> {
        let record = self.record(id).ok_or(ServiceError::UnknownRecord(id))?;
        if !self.downloads.is_stored_locally(&record).await {
            return Err(ServiceError::NotStoredLocally(id));
        }
        let Some(name) = record.read().local_file_name().map(str::to_string) else {
            return Err(ServiceError::NotStoredLocally(id));
        };
        let path = self.downloads.local_path(&name);
        let url = Url::from_file_path(&path)
            .map_err(|()| ServiceError::InvalidMediaPath(path.display().to_string()))?;

        if self.player.status() != PlaybackStatus::Idle {
            self.player.stop().await;
        }
        self.state.lock().playing = Some(id);
        if let Err(err) = self.player.start(url).await {
            self.state.lock().playing = None;
            return Err(err.into());
        }
        info!(record = %id, file = %name, "playback started");
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.player.pause().await.map_err(Into::into)
    }

    pub async fn resume(&self) -> Result<()> {
        self.player.resume().await.map_err(Into::into)
    }

    /// Stop playback and forget the playing record.
    pub async fn stop_playback(&self) {
        self.player.stop().await;
        self.state.lock().playing = None;
    }

    /// Id of the record currently loaded in the player, if any.
    pub fn playing(&self) -> Option<RecordId> {
        self.state.lock().playing
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn catalog_url(&self) -> Result<Url> {
        let token = self.tokens.generate_token();
        let raw = format!(
            "{}/?access-token={}",
            self.records_endpoint.trim_end_matches('/'),
            token
        );
        Url::parse(&raw)
            .map_err(|e| ServiceError::Catalog(CatalogError::InvalidEndpoint(format!("{raw}: {e}"))))
    }
}
