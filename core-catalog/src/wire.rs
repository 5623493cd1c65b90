//! # Catalog Wire Decoding
//!
//! Decoders for the two JSON payloads the catalog API serves. Both shapes
//! must be preserved for compatibility:
//!
//! ```text
//! catalog:  [{ "id": 3, "author": "…", "name": "…",
//!              "readedAt": "2005-08-02T22:33:15+04:00", "radioStation": "…" }, …]
//! manifest: [{ "id": 12772, "bitrate": "168kbps", "channels": "Stereo",
//!              "mode": "VBR", "size": 11141120, "url": "http://…" }, …]
//! ```
//!
//! Individual entries that fail to decode are logged and skipped; a
//! non-empty payload where every entry fails is a parse error.

use crate::error::{CatalogError, Result};
use crate::models::{Record, RecordId, Track};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use tracing::warn;
use url::Url;

/// Wire shape of one catalog entry.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: u64,
    author: String,
    #[serde(rename = "name")]
    title: String,
    #[serde(rename = "readedAt")]
    read_date: String,
    #[serde(rename = "radioStation")]
    station: String,
}

/// Wire shape of one tracks-manifest entry.
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: u64,
    bitrate: String,
    channels: String,
    mode: String,
    size: u64,
    url: String,
}

/// Decode the catalog listing into records.
///
/// # Errors
///
/// [`CatalogError::MalformedCatalog`] when the payload is not a JSON array
/// or no entry at all could be decoded.
pub fn decode_catalog(payload: &[u8]) -> Result<Vec<Record>> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(payload)
        .map_err(|e| CatalogError::MalformedCatalog(e.to_string()))?;

    let total = entries.len();
    let mut records = Vec::with_capacity(total);
    for entry in entries {
        match serde_json::from_value::<CatalogEntry>(entry) {
            Ok(entry) => records.push(Record::new(
                RecordId::new(entry.id),
                entry.author,
                entry.title,
                parse_read_date(&entry.read_date),
                entry.station,
            )),
            Err(error) => warn!(%error, "skipping undecodable catalog entry"),
        }
    }

    if records.is_empty() && total > 0 {
        return Err(CatalogError::MalformedCatalog(
            "no catalog entry could be decoded".to_string(),
        ));
    }

    Ok(records)
}

/// Decode a tracks manifest.
///
/// An empty array decodes to an empty vector; classifying that as a broken
/// record is the resolver's call.
///
/// # Errors
///
/// [`CatalogError::MalformedManifest`] when the payload is not a JSON
/// array or no entry at all could be decoded.
pub fn decode_manifest(payload: &[u8]) -> Result<Vec<Track>> {
    let entries: Vec<serde_json::Value> = serde_json::from_slice(payload)
        .map_err(|e| CatalogError::MalformedManifest(e.to_string()))?;

    let total = entries.len();
    let mut tracks = Vec::with_capacity(total);
    for entry in entries {
        let entry = match serde_json::from_value::<ManifestEntry>(entry) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(%error, "skipping undecodable manifest entry");
                continue;
            }
        };
        match Url::parse(&entry.url) {
            Ok(url) => tracks.push(Track {
                id: entry.id,
                bitrate: entry.bitrate,
                channels: entry.channels,
                mode: entry.mode,
                size: entry.size,
                url,
            }),
            Err(error) => warn!(track = entry.id, %error, "skipping manifest entry with unparseable URL"),
        }
    }

    if tracks.is_empty() && total > 0 {
        return Err(CatalogError::MalformedManifest(
            "no manifest entry could be decoded".to_string(),
        ));
    }

    Ok(tracks)
}

/// The wire carries a date-time with offset; placeholder values that do
/// not parse become `None`.
fn parse_read_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}
