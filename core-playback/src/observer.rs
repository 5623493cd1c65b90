//! Player observer interface.
//!
//! The original delegate surface becomes a plain trait: the status
//! callback is required, the rest default to no-ops so hosts implement
//! only what they render.

use crate::error::PlaybackError;
use crate::player::PlaybackStatus;

/// Receives playback notifications.
///
/// Callbacks are invoked synchronously on the thread driving the player;
/// implementations must not block and must not call back into the player.
pub trait PlayerObserver: Send + Sync {
    /// Invoked on every status transition, in strict per-session order.
    fn status_changed(&self, status: PlaybackStatus);

    /// Invoked once per session when the track duration becomes known.
    fn duration_detected(&self, duration_ms: u64) {
        let _ = duration_ms;
    }

    /// Periodic playhead report while playing.
    fn current_time(&self, position_ms: u64) {
        let _ = position_ms;
    }

    /// A playback error was raised; the same error is also returned to
    /// the caller where one exists.
    fn playback_error(&self, error: &PlaybackError) {
        let _ = error;
    }
}

/// Observer that ignores every notification, for hosts that only poll.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlayerObserver for NoopObserver {
    fn status_changed(&self, _status: PlaybackStatus) {}
}
