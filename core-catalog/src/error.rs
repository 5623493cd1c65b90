//! # Catalog Error Types

use crate::models::BrokenReason;
use bridge_traits::{error::BridgeError, http::TransportError};
use thiserror::Error;

/// Errors that can occur while working with the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// A catalog or manifest fetch failed at the transport level.
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ========================================================================
    // Parse Errors
    // ========================================================================
    /// The catalog payload was not valid catalog JSON.
    #[error("Malformed catalog payload: {0}")]
    MalformedCatalog(String),

    /// The tracks-manifest payload was not valid manifest JSON.
    #[error("Malformed tracks manifest: {0}")]
    MalformedManifest(String),

    // ========================================================================
    // Resolution Errors (terminal playability failures)
    // ========================================================================
    /// The manifest parsed successfully but contained no entries.
    #[error("Tracks manifest is empty")]
    EmptyManifest,

    /// The manifest had entries, none of them with an http(s) URL.
    #[error("No track with an http(s) URL in the manifest")]
    NoPlayableTrack,

    /// The record was previously marked broken.
    #[error("Record is broken: {0}")]
    RecordBroken(BrokenReason),

    /// Another resolution for the same record is still running.
    #[error("Resolution already in flight for this record")]
    ResolveInFlight,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The configured endpoint does not form a valid URL.
    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The archive bridge failed.
    #[error("Archive error: {0}")]
    Storage(#[from] BridgeError),

    /// The archived payload could not be decoded.
    #[error("Corrupted archive payload: {0}")]
    CorruptedArchive(String),
}

impl CatalogError {
    /// Returns `true` when the underlying operation was cancelled by the
    /// caller; cancellations are silent no-ops, never user-visible errors.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CatalogError::Transport(t) if t.is_cancelled())
    }

    /// The broken-record classification this error maps to, when it is a
    /// terminal playability failure.
    pub fn broken_reason(&self) -> Option<BrokenReason> {
        match self {
            CatalogError::EmptyManifest => Some(BrokenReason::EmptyManifest),
            CatalogError::NoPlayableTrack => Some(BrokenReason::NoPlayableTrack),
            CatalogError::MalformedManifest(_) => Some(BrokenReason::MalformedManifest),
            CatalogError::RecordBroken(reason) => Some(reason.clone()),
            _ => None,
        }
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
