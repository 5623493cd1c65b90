//! # Playback State Machine
//!
//! A single-player abstraction over one active media URL.
//!
//! [`RemotePlayer`] owns exactly one [`bridge_traits::MediaSession`] at a
//! time and drives it through the status machine
//!
//! ```text
//! Idle → Starting → Playing ⇄ Paused
//!             (transient: Seeking, TimeChanging)
//! ```
//!
//! Transitions are guarded; illegal requests are rejected without side
//! effects and reported through [`PlaybackError`]. Registered
//! [`PlayerObserver`]s are notified synchronously on every status change,
//! in strict per-session order.

pub mod error;
pub mod observer;
pub mod player;

pub use error::{PlaybackError, Result};
pub use observer::{NoopObserver, PlayerObserver};
pub use player::{PlaybackStatus, PlayerConfig, RemotePlayer};
