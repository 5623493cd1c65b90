//! # Catalog Domain Model
//!
//! Records, tracks and playlist membership. A [`Record`] carries both its
//! catalog metadata and the runtime bookkeeping the resolver and download
//! coordinator maintain: resolution state, local file name, and download
//! progress. At most one of {resolving, downloading} is true for a record
//! at any time.

use chrono::{DateTime, FixedOffset};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use url::Url;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique key of one catalog record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ============================================================================
// Track
// ============================================================================

/// A concrete playable media reference. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Track id within the catalog.
    pub id: u64,
    /// Encoder bitrate as reported by the catalog (e.g. "168kbps").
    pub bitrate: String,
    /// Channel layout (e.g. "Stereo").
    pub channels: String,
    /// Encoding mode (e.g. "VBR").
    pub mode: String,
    /// File size in bytes.
    pub size: u64,
    /// Media URL.
    pub url: Url,
}

impl Track {
    /// Playable media must be reachable over plain http(s); other schemes
    /// are skipped during resolution.
    pub fn is_playable(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }
}

// ============================================================================
// Resolution State
// ============================================================================

/// Why a record cannot be played. Terminal for the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokenReason {
    /// The tracks manifest parsed but contained no entries.
    EmptyManifest,
    /// The manifest had entries, none with an http(s) URL.
    NoPlayableTrack,
    /// The manifest response was not valid manifest JSON.
    MalformedManifest,
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BrokenReason::EmptyManifest => "empty manifest",
            BrokenReason::NoPlayableTrack => "no playable track",
            BrokenReason::MalformedManifest => "malformed manifest",
        };
        write!(f, "{text}")
    }
}

/// Lifecycle of a record's tracks manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    /// No manifest fetched yet.
    Unresolved,
    /// A manifest fetch is in flight.
    Resolving,
    /// The manifest is cached on the record.
    Resolved(Vec<Track>),
    /// The record has no playable media.
    Broken(BrokenReason),
}

// ============================================================================
// Record
// ============================================================================

/// One catalog entry.
///
/// Metadata fields come off the wire; the private fields are runtime
/// bookkeeping mutated by the resolver (resolution state) and the download
/// coordinator (progress, local file name). A record is never destroyed
/// while the playlist references it.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub author: String,
    pub title: String,
    /// When the record was read on air; the wire value may be a
    /// placeholder that fails to parse, in which case this is `None`.
    pub read_date: Option<DateTime<FixedOffset>>,
    /// Radio station the record aired on; often empty.
    pub station: String,

    resolution: ResolutionState,
    local_file_name: Option<String>,
    downloading: bool,
    download_progress: Option<f32>,
}

impl Record {
    pub fn new(
        id: RecordId,
        author: impl Into<String>,
        title: impl Into<String>,
        read_date: Option<DateTime<FixedOffset>>,
        station: impl Into<String>,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            title: title.into(),
            read_date,
            station: station.into(),
            resolution: ResolutionState::Unresolved,
            local_file_name: None,
            downloading: false,
            download_progress: None,
        }
    }

    /// Rebuild a record from archived state.
    pub fn restored(
        id: RecordId,
        author: impl Into<String>,
        title: impl Into<String>,
        read_date: Option<DateTime<FixedOffset>>,
        station: impl Into<String>,
        tracks: Option<Vec<Track>>,
        local_file_name: Option<String>,
    ) -> Self {
        let mut record = Self::new(id, author, title, read_date, station);
        if let Some(tracks) = tracks {
            record.resolution = ResolutionState::Resolved(tracks);
        }
        record.local_file_name = local_file_name;
        record
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    pub fn resolution(&self) -> &ResolutionState {
        &self.resolution
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self.resolution, ResolutionState::Resolving)
    }

    /// `true` when the record is known to have no playable media.
    pub fn is_broken(&self) -> bool {
        matches!(self.resolution, ResolutionState::Broken(_))
    }

    pub fn broken_reason(&self) -> Option<&BrokenReason> {
        match &self.resolution {
            ResolutionState::Broken(reason) => Some(reason),
            _ => None,
        }
    }

    /// The cached manifest, when resolved.
    pub fn tracks(&self) -> Option<&[Track]> {
        match &self.resolution {
            ResolutionState::Resolved(tracks) => Some(tracks),
            _ => None,
        }
    }

    /// First manifest entry with an http(s) URL, in manifest order.
    pub fn first_playable_track(&self) -> Option<&Track> {
        self.tracks()
            .and_then(|tracks| tracks.iter().find(|t| t.is_playable()))
    }

    /// Enter the resolving state. A record never resolves while a
    /// download is running.
    pub fn set_resolving(&mut self) {
        debug_assert!(!self.downloading, "resolving while downloading");
        self.resolution = ResolutionState::Resolving;
    }

    /// Drop back to unresolved after a non-terminal fetch failure so a
    /// later resolve can try again.
    pub fn clear_resolving(&mut self) {
        self.resolution = ResolutionState::Unresolved;
    }

    /// Cache the fetched manifest.
    pub fn set_resolved(&mut self, tracks: Vec<Track>) {
        self.resolution = ResolutionState::Resolved(tracks);
    }

    /// Mark the record as terminally unplayable.
    pub fn mark_broken(&mut self, reason: BrokenReason) {
        self.resolution = ResolutionState::Broken(reason);
    }

    // ------------------------------------------------------------------
    // Download bookkeeping
    // ------------------------------------------------------------------

    /// The local file name the media is (or will be) stored under. Set as
    /// soon as a download starts, before the transfer completes, so
    /// partial state is detectable. Actual presence on disk must be
    /// checked separately.
    pub fn local_file_name(&self) -> Option<&str> {
        self.local_file_name.as_deref()
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading
    }

    /// Fraction completed in `[0, 1]`; `None` while no transfer runs or
    /// before the first progress event arrives.
    pub fn download_progress(&self) -> Option<f32> {
        self.download_progress
    }

    /// Record that a transfer for `file_name` has started.
    pub fn begin_download(&mut self, file_name: impl Into<String>) {
        debug_assert!(!self.is_resolving(), "downloading while resolving");
        self.local_file_name = Some(file_name.into());
        self.downloading = true;
        self.download_progress = None;
    }

    pub fn set_download_progress(&mut self, fraction: f32) {
        debug_assert!(self.downloading, "progress without an active download");
        self.download_progress = Some(fraction.clamp(0.0, 1.0));
    }

    /// The transfer reached a terminal state; the file name stays recorded.
    pub fn finish_download(&mut self) {
        self.downloading = false;
        self.download_progress = None;
    }

    /// Forget the local file name after the local copy was deleted.
    pub fn clear_local_file(&mut self) {
        self.local_file_name = None;
    }
}

/// Shared handle to a mutable record.
///
/// Mutation is serialized through the owning service; the lock makes reads
/// cheap for UI snapshots and is never held across an await point.
pub type SharedRecord = Arc<RwLock<Record>>;

/// Wrap a record into its shared handle.
pub fn shared(record: Record) -> SharedRecord {
    Arc::new(RwLock::new(record))
}

// ============================================================================
// Playlist
// ============================================================================

/// Ordered, duplicate-free playlist membership.
///
/// Insertion order is preserved for display; membership checks are O(1).
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    order: Vec<RecordId>,
    members: HashSet<RecordId>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id`, returning `false` when it was already present.
    pub fn insert(&mut self, id: RecordId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push(id);
        true
    }

    /// Remove `id`, returning `false` when it was not present.
    pub fn remove(&mut self, id: RecordId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        self.order.retain(|other| *other != id);
        true
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.members.contains(&id)
    }

    /// Member ids in insertion order.
    pub fn ids(&self) -> &[RecordId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: u64, url: &str) -> Track {
        Track {
            id,
            bitrate: "168kbps".to_string(),
            channels: "Stereo".to_string(),
            mode: "VBR".to_string(),
            size: 11_141_120,
            url: Url::parse(url).unwrap(),
        }
    }

    fn record(id: u64) -> Record {
        Record::new(RecordId::new(id), "Кир Булычев", "Они уже здесь!", None, "")
    }

    #[test]
    fn track_playability_requires_http_scheme() {
        assert!(track(1, "http://mds.example/a.mp3").is_playable());
        assert!(track(2, "https://mds.example/a.mp3").is_playable());
        assert!(!track(3, "ftp://mds.example/a.mp3").is_playable());
        assert!(!track(4, "file:///a.mp3").is_playable());
    }

    #[test]
    fn first_playable_track_skips_non_http_entries() {
        let mut rec = record(1);
        rec.set_resolved(vec![
            track(1, "ftp://mds.example/a.mp3"),
            track(2, "rtsp://mds.example/a.mp3"),
            track(3, "http://mds.example/b.mp3"),
            track(4, "http://mds.example/c.mp3"),
        ]);

        assert_eq!(rec.first_playable_track().unwrap().id, 3);
    }

    #[test]
    fn resolution_state_transitions() {
        let mut rec = record(1);
        assert_eq!(rec.resolution(), &ResolutionState::Unresolved);

        rec.set_resolving();
        assert!(rec.is_resolving());

        rec.clear_resolving();
        assert_eq!(rec.resolution(), &ResolutionState::Unresolved);

        rec.mark_broken(BrokenReason::EmptyManifest);
        assert!(rec.is_broken());
        assert_eq!(rec.broken_reason(), Some(&BrokenReason::EmptyManifest));
    }

    #[test]
    fn download_bookkeeping_keeps_file_name_after_terminal_event() {
        let mut rec = record(1);
        rec.begin_download("y.mp3");
        assert!(rec.is_downloading());
        assert_eq!(rec.local_file_name(), Some("y.mp3"));
        assert_eq!(rec.download_progress(), None);

        rec.set_download_progress(0.5);
        assert_eq!(rec.download_progress(), Some(0.5));

        rec.finish_download();
        assert!(!rec.is_downloading());
        assert_eq!(rec.download_progress(), None);
        assert_eq!(rec.local_file_name(), Some("y.mp3"));

        rec.clear_local_file();
        assert_eq!(rec.local_file_name(), None);
    }

    #[test]
    fn download_progress_is_clamped() {
        let mut rec = record(1);
        rec.begin_download("y.mp3");
        rec.set_download_progress(1.5);
        assert_eq!(rec.download_progress(), Some(1.0));
        rec.set_download_progress(-0.1);
        assert_eq!(rec.download_progress(), Some(0.0));
    }

    #[test]
    fn playlist_preserves_insertion_order() {
        let mut playlist = Playlist::new();
        assert!(playlist.insert(RecordId::new(3)));
        assert!(playlist.insert(RecordId::new(1)));
        assert!(playlist.insert(RecordId::new(2)));

        let ids: Vec<u64> = playlist.ids().iter().map(|id| id.as_u64()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn playlist_rejects_duplicates() {
        let mut playlist = Playlist::new();
        assert!(playlist.insert(RecordId::new(7)));
        assert!(!playlist.insert(RecordId::new(7)));
        assert_eq!(playlist.len(), 1);
    }

    #[test]
    fn playlist_remove_keeps_remaining_order() {
        let mut playlist = Playlist::new();
        for id in [5, 6, 7] {
            playlist.insert(RecordId::new(id));
        }

        assert!(playlist.remove(RecordId::new(6)));
        assert!(!playlist.remove(RecordId::new(6)));
        assert!(!playlist.contains(RecordId::new(6)));

        let ids: Vec<u64> = playlist.ids().iter().map(|id| id.as_u64()).collect();
        assert_eq!(ids, vec![5, 7]);
    }

    #[test]
    fn restored_record_carries_cached_manifest() {
        let rec = Record::restored(
            RecordId::new(42),
            "Борис Виан",
            "Пена дней",
            None,
            "",
            Some(vec![track(1, "http://mds.example/y.mp3")]),
            Some("y.mp3".to_string()),
        );

        assert!(rec.first_playable_track().is_some());
        assert_eq!(rec.local_file_name(), Some("y.mp3"));
        assert!(!rec.is_downloading());
    }
}
