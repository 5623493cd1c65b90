//! # Catalog Repository
//!
//! Persists the full record set and the playlist member ids through the
//! [`ArchiveStore`] bridge, and reloads both at startup. Runtime-only
//! state (resolution in flight, download progress) is never archived; a
//! cached manifest and the recorded local file name are.

use crate::error::{CatalogError, Result};
use crate::models::{Record, RecordId, Track};
use bridge_traits::ArchiveStore;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Archive key holding every known record.
const ALL_RECORDS_KEY: &str = "AllRecords";

/// Archive key holding the ordered playlist member ids.
const PLAYLIST_IDS_KEY: &str = "PlaylistRecordIds";

/// Durable snapshot of one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: u64,
    pub author: String,
    pub title: String,
    #[serde(rename = "readedAt")]
    pub read_date: Option<DateTime<FixedOffset>>,
    #[serde(rename = "radioStation")]
    pub station: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Track>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_file_name: Option<String>,
}

impl From<&Record> for StoredRecord {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.as_u64(),
            author: record.author.clone(),
            title: record.title.clone(),
            read_date: record.read_date,
            station: record.station.clone(),
            tracks: record.tracks().map(|t| t.to_vec()),
            local_file_name: record.local_file_name().map(str::to_string),
        }
    }
}

impl From<StoredRecord> for Record {
    fn from(stored: StoredRecord) -> Self {
        Record::restored(
            RecordId::new(stored.id),
            stored.author,
            stored.title,
            stored.read_date,
            stored.station,
            stored.tracks,
            stored.local_file_name,
        )
    }
}

/// Archive-backed persistence for catalog state.
pub struct CatalogRepository {
    archive: Arc<dyn ArchiveStore>,
}

impl CatalogRepository {
    pub fn new(archive: Arc<dyn ArchiveStore>) -> Self {
        Self { archive }
    }

    /// Persist the record set and playlist membership.
    ///
    /// # Errors
    ///
    /// Surfaces archive bridge failures; callers on mutation paths log and
    /// tolerate them without rolling back in-memory state.
    pub async fn store(&self, records: &[StoredRecord], playlist: &[RecordId]) -> Result<()> {
        let records_json = serde_json::to_vec(records)
            .map_err(|e| CatalogError::CorruptedArchive(e.to_string()))?;
        self.archive
            .put(ALL_RECORDS_KEY, Bytes::from(records_json))
            .await?;

        let ids: Vec<u64> = playlist.iter().map(RecordId::as_u64).collect();
        let ids_json =
            serde_json::to_vec(&ids).map_err(|e| CatalogError::CorruptedArchive(e.to_string()))?;
        self.archive
            .put(PLAYLIST_IDS_KEY, Bytes::from(ids_json))
            .await?;

        debug!(
            records = records.len(),
            playlist = playlist.len(),
            "client state archived"
        );
        Ok(())
    }

    /// Load the archived record set and playlist ids.
    ///
    /// Returns `None` when nothing was ever archived. A record archive
    /// without playlist ids loads as an empty playlist.
    pub async fn load(&self) -> Result<Option<(Vec<StoredRecord>, Vec<RecordId>)>> {
        let Some(records_raw) = self.archive.get(ALL_RECORDS_KEY).await? else {
            return Ok(None);
        };
        let records: Vec<StoredRecord> = serde_json::from_slice(&records_raw)
            .map_err(|e| CatalogError::CorruptedArchive(e.to_string()))?;

        let ids: Vec<u64> = match self.archive.get(PLAYLIST_IDS_KEY).await? {
            Some(raw) => serde_json::from_slice(&raw)
                .map_err(|e| CatalogError::CorruptedArchive(e.to_string()))?,
            None => Vec::new(),
        };

        Ok(Some((records, ids.into_iter().map(RecordId::new).collect())))
    }
}
