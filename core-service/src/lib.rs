//! # Client Service Layer
//!
//! [`PlaylistService`] is the single owner of the catalog and the
//! playlist: it downloads and persists the record set, serializes playlist
//! mutations, coordinates the resolver → download pipeline per record, and
//! fronts the playback state machine. Hosts construct it from a validated
//! [`core_runtime::config::CoreConfig`] and drain its event bus on their
//! main execution context.

pub mod error;
pub mod store;

pub use error::{Result, ServiceError};
pub use store::PlaylistService;
