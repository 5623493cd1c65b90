//! # Playback Error Types

use crate::player::PlaybackStatus;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // State Errors (illegal transition requests; rejected, no state change)
    // ========================================================================
    /// The requested operation is not legal in the current status.
    #[error("Unexpected status {status} on {op}")]
    UnexpectedStatus {
        op: &'static str,
        status: PlaybackStatus,
    },

    /// The operation needs a media session and none is loaded.
    #[error("No active media session for {op}")]
    NoActiveSession { op: &'static str },

    /// Resume was requested while the playhead is already advancing.
    #[error("Playback is not paused")]
    NotPaused,

    /// Resume was requested without a recorded pause position.
    #[error("No pause position recorded")]
    PausePositionMissing,

    /// A seek target cannot be computed before the duration is known.
    #[error("Track duration unknown")]
    DurationUnknown,

    /// Volume must lie in `[0.0, 1.0]`.
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The underlying media engine failed.
    #[error("Media engine error: {0}")]
    Engine(String),

    // ========================================================================
    // Internal Errors
    // ========================================================================
    /// A violated internal invariant; indicates a logic bug. Fails loudly
    /// in debug builds before surfacing here.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` for rejected-transition errors that leave the state
    /// machine untouched.
    pub fn is_state_error(&self) -> bool {
        !matches!(
            self,
            PlaybackError::Engine(_) | PlaybackError::Internal(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
