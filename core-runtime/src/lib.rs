//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the client core:
//! - Logging and tracing setup
//! - Configuration management with injected platform bridges
//! - Event bus for UI-visible state changes
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other modules depend on.
//! It establishes the logging conventions, the configuration surface, and
//! the event broadcasting mechanism through which status transitions,
//! download progress and playlist changes reach the host's main execution
//! context.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
