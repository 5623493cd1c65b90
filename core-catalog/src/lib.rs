//! # Catalog Domain
//!
//! The catalog half of the client core:
//! - Domain model: [`Record`], [`Track`], playlist membership
//! - Wire decoding of the catalog and tracks-manifest JSON
//! - [`TrackResolver`]: record → first playable track, with bounded retry
//! - [`CatalogRepository`]: durable record set + playlist membership
//!
//! ## Overview
//!
//! A [`Record`] is one catalog entry; it may or may not yet hold a resolved
//! tracks manifest. The [`TrackResolver`] turns a record into a playable
//! [`Track`] by fetching its manifest from the authenticated catalog API,
//! retrying transient transport failures a bounded number of times and
//! caching the manifest on the record so later resolutions answer without
//! touching the network. Records whose manifest is empty, malformed, or
//! free of http(s) entries are marked broken and stay that way.

pub mod error;
pub mod models;
pub mod repository;
pub mod resolver;
pub mod wire;

pub use error::{CatalogError, Result};
pub use models::{
    shared, BrokenReason, Playlist, Record, RecordId, ResolutionState, SharedRecord, Track,
};
pub use repository::{CatalogRepository, StoredRecord};
pub use resolver::TrackResolver;
