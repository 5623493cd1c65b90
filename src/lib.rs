//! Workspace placeholder crate.
//!
//! This crate exists to expose feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `bridge-desktop`). Host
//! applications can depend on `mds-core` with the `desktop` feature enabled
//! and reach the whole client core without wiring each crate individually.

#[cfg(feature = "desktop")]
pub use bridge_desktop;
#[cfg(feature = "desktop")]
pub use core_service;
