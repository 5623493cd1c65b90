//! # Download Coordination
//!
//! Owns the background transfer of resolved media files: at most one
//! observed download per record, throttled progress reporting, ticket-
//! guarded cancellation, and the explicit local-copy deletion invoked when
//! a record leaves the playlist.

pub mod coordinator;
pub mod error;

pub use coordinator::{DownloadCoordinator, TransferConfig, TransferTicket};
pub use error::{Result, TransferError};
