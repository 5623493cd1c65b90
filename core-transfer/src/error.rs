//! # Transfer Error Types

use bridge_traits::error::BridgeError;
use core_catalog::RecordId;
use thiserror::Error;
use url::Url;

/// Errors that can occur while coordinating downloads.
#[derive(Error, Debug)]
pub enum TransferError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The track URL has no final path segment to derive a file name from.
    #[error("Track URL has no file name: {0}")]
    MissingFileName(Url),

    /// The track URL's file name carries no extension.
    #[error("Track URL has no file extension: {0}")]
    MissingFileExtension(Url),

    // ========================================================================
    // State Errors
    // ========================================================================
    /// A transfer is already running for this record.
    #[error("A download is already active for record {0}")]
    AlreadyDownloading(RecordId),

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// The file system bridge failed.
    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),
}

/// Result type for transfer operations.
pub type Result<T> = std::result::Result<T, TransferError>;
