//! Media engine bridge traits.
//!
//! These abstractions let the playback state machine drive a native media
//! engine (AVPlayer, ExoPlayer, GStreamer, ...) without knowing which one it
//! is. The core owns exactly one [`MediaSession`] at a time; no other
//! component touches the underlying engine directly.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::error::Result;

/// Emitted once the underlying engine has loaded enough of the media to
/// begin playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadySignal {
    /// Total track duration, when the container announces one.
    pub duration: Option<Duration>,
}

/// One active playback session over a single media URL.
///
/// Sessions are opened by a [`MediaEngine`] and released by dropping them.
/// All methods refer to the playhead of this session only.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Resolves when the session is ready to play. One-shot: awaited once,
    /// right after the session is opened.
    async fn ready(&self) -> Result<ReadySignal>;

    /// Begin or continue advancing the playhead.
    async fn play(&self) -> Result<()>;

    /// Halt the playhead without releasing the session.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position. Resolves when the seek has completed.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current playhead position.
    async fn position(&self) -> Result<Duration>;

    /// `true` while the playhead is advancing (playback rate > 0).
    fn is_advancing(&self) -> bool;

    /// Adjust volume, normalized to `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;
}

/// Factory for [`MediaSession`]s backed by the platform's media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Open a new session for `url`, allocating native player resources.
    async fn open(&self, url: Url) -> Result<Arc<dyn MediaSession>>;
}
