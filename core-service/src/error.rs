//! # Service Error Types

use core_catalog::{CatalogError, RecordId};
use core_playback::PlaybackError;
use core_transfer::TransferError;
use thiserror::Error;

/// Errors surfaced by the service layer to the host.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The id names no known catalog record.
    #[error("Unknown record: {0}")]
    UnknownRecord(RecordId),

    /// Adding a record that is already a playlist member.
    #[error("Record {0} is already in the playlist")]
    AlreadyInPlaylist(RecordId),

    /// Removing a record that is not a playlist member.
    #[error("Record {0} is not in the playlist")]
    NotInPlaylist(RecordId),

    /// Playback requires the media file on local storage.
    #[error("Record {0} is not stored locally")]
    NotStoredLocally(RecordId),

    /// The local media path cannot be expressed as a URL.
    #[error("Cannot build media URL from path: {0}")]
    InvalidMediaPath(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
