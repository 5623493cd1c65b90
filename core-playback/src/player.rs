//! # Remote Player
//!
//! Drives one media session through the playback status machine.
//!
//! ## Design
//!
//! - Exactly one session is owned at a time; `start` is only legal from
//!   `Idle`, and stopping (or starting a different URL via the service
//!   layer) tears the previous session down first.
//! - Readiness, seek completion and time reporting arrive asynchronously.
//!   Every session start bumps a generation counter; asynchronous
//!   callbacks carry the generation they were spawned under and are
//!   discarded once it no longer matches, so a superseded session can
//!   never mutate the machine.
//! - While `Playing`, a periodic task reports the playhead to the
//!   observer. The timer must exist exactly while playing; a mismatch at
//!   a seam is a logic bug that fails loudly in debug builds.

use crate::error::{PlaybackError, Result};
use crate::observer::PlayerObserver;
use bridge_traits::{BridgeError, MediaEngine, MediaSession};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

// ============================================================================
// Status
// ============================================================================

/// Playback status of the single active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// No session loaded. Initial state, and terminal after `stop`.
    Idle,
    /// Session opened, waiting for the engine's ready signal.
    Starting,
    /// The playhead is advancing.
    Playing,
    /// Halted at a recorded position.
    Paused,
    /// The user is scrubbing; the playhead has not moved yet.
    TimeChanging,
    /// A seek was issued and has not completed.
    Seeking,
}

impl PlaybackStatus {
    /// Transient states entered only from Playing/Paused, always returning
    /// to one of them.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaybackStatus::TimeChanging | PlaybackStatus::Seeking)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Starting => "starting",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::TimeChanging => "time-changing",
            PlaybackStatus::Seeking => "seeking",
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Most recent user-level playback action. Decides whether a completed
/// scrub seeks now or only re-arms the pause position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaybackAction {
    None,
    Play,
    Pause,
    Resume,
}

/// Player configuration.
#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    /// Period of the playhead report while playing.
    pub time_report_interval: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            time_report_interval: Duration::from_secs(1),
        }
    }
}

// ============================================================================
// Player
// ============================================================================

struct PlayerState {
    status: PlaybackStatus,
    session: Option<Arc<dyn MediaSession>>,
    url: Option<Url>,
    duration: Option<Duration>,
    paused_at: Option<Duration>,
    last_action: PlaybackAction,
    generation: u64,
    report_task: Option<JoinHandle<()>>,
}

type SharedState = Arc<Mutex<PlayerState>>;

/// The single active player over one remote or local media URL.
pub struct RemotePlayer {
    engine: Arc<dyn MediaEngine>,
    observer: Arc<dyn PlayerObserver>,
    config: PlayerConfig,
    state: SharedState,
}

impl RemotePlayer {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        observer: Arc<dyn PlayerObserver>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            engine,
            observer,
            config,
            state: Arc::new(Mutex::new(PlayerState {
                status: PlaybackStatus::Idle,
                session: None,
                url: None,
                duration: None,
                paused_at: None,
                last_action: PlaybackAction::None,
                generation: 0,
                report_task: None,
            })),
        }
    }

    /// Current status.
    pub fn status(&self) -> PlaybackStatus {
        self.state.lock().status
    }

    /// URL of the loaded session, if any.
    pub fn current_url(&self) -> Option<Url> {
        self.state.lock().url.clone()
    }

    /// Known track duration, once the engine reported ready.
    pub fn duration(&self) -> Option<Duration> {
        self.state.lock().duration
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Open `url` and start playback.
    ///
    /// Legal only from `Idle`. The status becomes `Starting` once the
    /// session exists and `Playing` when the engine signals readiness;
    /// this call returns at `Starting`.
    pub async fn start(&self, url: Url) -> Result<()> {
        let generation = {
            let mut st = self.state.lock();
            if st.status != PlaybackStatus::Idle {
                return Err(self.reject("start", st.status));
            }
            st.generation += 1;
            st.generation
        };

        debug!(%url, "opening media session");
        let session = self
            .engine
            .open(url.clone())
            .await
            .map_err(|e| self.engine_error(e))?;

        {
            let mut st = self.state.lock();
            if st.generation != generation {
                // stop() superseded this start while the session opened.
                debug!(%url, "session open superseded");
                return Ok(());
            }
            st.session = Some(Arc::clone(&session));
            st.url = Some(url);
            st.last_action = PlaybackAction::Play;
            self.set_status(&mut st, PlaybackStatus::Starting);
        }

        session.play().await.map_err(|e| self.engine_error(e))?;
        self.spawn_ready_watch(session, generation);
        Ok(())
    }

    /// Halt playback, recording the position for a later resume.
    ///
    /// Legal from any state except `Paused` itself.
    pub async fn pause(&self) -> Result<()> {
        let session = {
            let st = self.state.lock();
            if st.status == PlaybackStatus::Paused {
                return Err(self.reject("pause", st.status));
            }
            match &st.session {
                Some(session) => Arc::clone(session),
                None => return Err(self.session_missing("pause")),
            }
        };

        let position = session.position().await.map_err(|e| self.engine_error(e))?;
        session.pause().await.map_err(|e| self.engine_error(e))?;

        let mut st = self.state.lock();
        st.last_action = PlaybackAction::Pause;
        st.paused_at = Some(position);
        cancel_report_task(&mut st);
        info!(position_ms = position.as_millis() as u64, "playback paused");
        self.set_status(&mut st, PlaybackStatus::Paused);
        Ok(())
    }

    /// Resume from the recorded pause position.
    ///
    /// Legal only from `Paused` or `TimeChanging`, with a known pause
    /// position and a session that is not already advancing. Transitions
    /// through `Playing` then `Seeking` (to restore the exact position)
    /// and back to `Playing` once the seek completes.
    pub async fn resume(&self) -> Result<()> {
        let (session, paused_at, generation) = {
            let mut st = self.state.lock();
            if st.status != PlaybackStatus::Paused && st.status != PlaybackStatus::TimeChanging {
                return Err(self.reject("resume", st.status));
            }
            let session = match &st.session {
                Some(session) => Arc::clone(session),
                None => return Err(self.session_missing("resume")),
            };
            if session.is_advancing() {
                return Err(self.report(PlaybackError::NotPaused));
            }
            let Some(paused_at) = st.paused_at else {
                return Err(self.report(PlaybackError::PausePositionMissing));
            };
            st.last_action = PlaybackAction::Resume;
            (session, paused_at, st.generation)
        };

        session.play().await.map_err(|e| self.engine_error(e))?;

        {
            let mut st = self.state.lock();
            if st.generation != generation {
                return Ok(());
            }
            self.set_status(&mut st, PlaybackStatus::Playing);
            self.set_status(&mut st, PlaybackStatus::Seeking);
        }

        let result = session.seek(paused_at).await;
        self.finish_seek(session, generation, result).await
    }

    /// Enter the scrubbing state, suspending the time-report timer.
    ///
    /// The timer must exist exactly when leaving `Playing`; any other
    /// presence combination is a logic bug.
    pub fn start_seeking(&self) -> Result<()> {
        let mut st = self.state.lock();
        match st.status {
            PlaybackStatus::Playing => {
                if st.report_task.is_none() {
                    return Err(self.invariant_violation("time-report timer missing while playing"));
                }
            }
            PlaybackStatus::Paused | PlaybackStatus::TimeChanging | PlaybackStatus::Seeking => {
                if st.report_task.is_some() {
                    return Err(self.invariant_violation(
                        "time-report timer present outside playing",
                    ));
                }
            }
            PlaybackStatus::Idle | PlaybackStatus::Starting => {
                return Err(self.reject("start_seeking", st.status));
            }
        }

        cancel_report_task(&mut st);
        self.set_status(&mut st, PlaybackStatus::TimeChanging);
        Ok(())
    }

    /// Finish a scrub at `fraction` of the known duration.
    ///
    /// Legal only from `TimeChanging`. When the last action was a pause
    /// the target is stored for a later resume and the status returns to
    /// `Paused`; otherwise the seek is issued and the status passes
    /// through `Seeking` back to `Playing`.
    pub async fn complete_seeking(&self, fraction: f32) -> Result<()> {
        let (session, target, generation) = {
            let mut st = self.state.lock();
            if st.status != PlaybackStatus::TimeChanging {
                return Err(self.reject("complete_seeking", st.status));
            }
            let session = match &st.session {
                Some(session) => Arc::clone(session),
                None => return Err(self.session_missing("complete_seeking")),
            };
            let Some(duration) = st.duration else {
                return Err(self.report(PlaybackError::DurationUnknown));
            };
            let target = duration.mul_f64(f64::from(fraction.clamp(0.0, 1.0)));

            if st.last_action == PlaybackAction::Pause {
                // A paused player only re-arms its pause position; the
                // actual seek happens on the next resume.
                st.paused_at = Some(target);
                debug!(target_ms = target.as_millis() as u64, "seek target stored for resume");
                self.set_status(&mut st, PlaybackStatus::Paused);
                return Ok(());
            }

            self.set_status(&mut st, PlaybackStatus::Seeking);
            (session, target, st.generation)
        };

        let result = session.seek(target).await;
        self.finish_seek(session, generation, result).await
    }

    /// Tear the session down and return to `Idle`. Legal from any state.
    pub async fn stop(&self) {
        let session = {
            let st = self.state.lock();
            st.session.clone()
        };
        if let Some(session) = &session {
            if session.is_advancing() {
                if let Err(error) = session.pause().await {
                    debug!(%error, "halting session on stop failed");
                }
            }
        }

        let mut st = self.state.lock();
        // In-flight ready/seek/timer callbacks die against the new
        // generation.
        st.generation += 1;
        cancel_report_task(&mut st);
        st.session = None;
        st.url = None;
        st.duration = None;
        st.paused_at = None;
        st.last_action = PlaybackAction::None;
        info!("playback stopped");
        self.set_status(&mut st, PlaybackStatus::Idle);
    }

    /// Adjust session volume, normalized to `[0.0, 1.0]`.
    pub async fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(self.report(PlaybackError::InvalidVolume(volume)));
        }
        let session = self.state.lock().session.clone();
        let Some(session) = session else {
            return Err(self.session_missing("set_volume"));
        };
        session.set_volume(volume).await.map_err(|e| self.engine_error(e))
    }

    // ------------------------------------------------------------------
    // Async continuations
    // ------------------------------------------------------------------

    /// Wait for the engine's ready signal; on arrival (and if this
    /// session is still current) capture the duration, enter `Playing`
    /// and start the time-report timer.
    fn spawn_ready_watch(&self, session: Arc<dyn MediaSession>, generation: u64) {
        let state = Arc::clone(&self.state);
        let observer = Arc::clone(&self.observer);
        let interval = self.config.time_report_interval;

        tokio::spawn(async move {
            let signal = match session.ready().await {
                Ok(signal) => signal,
                Err(error) => {
                    warn!(%error, "media session failed to become ready");
                    observer.playback_error(&PlaybackError::Engine(error.to_string()));
                    return;
                }
            };

            let mut st = state.lock();
            if st.generation != generation || st.status != PlaybackStatus::Starting {
                debug!("discarding ready signal from superseded session");
                return;
            }

            st.duration = signal.duration;
            if let Some(duration) = signal.duration {
                observer.duration_detected(duration.as_millis() as u64);
            }

            st.status = PlaybackStatus::Playing;
            observer.status_changed(PlaybackStatus::Playing);
            spawn_report_task(&state, &mut st, &observer, session, interval, generation);
        });
    }

    /// Shared tail of resume/complete_seeking: once the seek lands and
    /// this session is still current and still `Seeking`, make sure the
    /// playhead advances, restart the timer, and settle in `Playing`.
    async fn finish_seek(
        &self,
        session: Arc<dyn MediaSession>,
        generation: u64,
        seek_result: bridge_traits::error::Result<()>,
    ) -> Result<()> {
        seek_result.map_err(|e| self.engine_error(e))?;

        {
            let st = self.state.lock();
            if st.generation != generation || st.status != PlaybackStatus::Seeking {
                debug!("discarding seek completion from superseded session");
                return Ok(());
            }
        }

        if !session.is_advancing() {
            session.play().await.map_err(|e| self.engine_error(e))?;
        }

        let mut st = self.state.lock();
        if st.generation != generation || st.status != PlaybackStatus::Seeking {
            return Ok(());
        }
        spawn_report_task(
            &self.state,
            &mut st,
            &self.observer,
            session,
            self.config.time_report_interval,
            generation,
        );
        self.set_status(&mut st, PlaybackStatus::Playing);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn set_status(&self, st: &mut PlayerState, status: PlaybackStatus) {
        st.status = status;
        self.observer.status_changed(status);
    }

    fn reject(&self, op: &'static str, status: PlaybackStatus) -> PlaybackError {
        self.report(PlaybackError::UnexpectedStatus { op, status })
    }

    fn session_missing(&self, op: &'static str) -> PlaybackError {
        self.report(PlaybackError::NoActiveSession { op })
    }

    fn report(&self, error: PlaybackError) -> PlaybackError {
        warn!(%error, "playback request rejected");
        self.observer.playback_error(&error);
        error
    }

    fn engine_error(&self, error: BridgeError) -> PlaybackError {
        let error = PlaybackError::Engine(error.to_string());
        warn!(%error, "media engine failure");
        self.observer.playback_error(&error);
        error
    }

    fn invariant_violation(&self, message: &'static str) -> PlaybackError {
        debug_assert!(false, "{message}");
        let error = PlaybackError::Internal(message.to_string());
        self.observer.playback_error(&error);
        error
    }
}

impl Drop for RemotePlayer {
    fn drop(&mut self) {
        let mut st = self.state.lock();
        cancel_report_task(&mut st);
    }
}

fn cancel_report_task(st: &mut PlayerState) {
    if let Some(task) = st.report_task.take() {
        task.abort();
    }
}

/// Start the periodic playhead report. The task checks generation and
/// status on every tick and stops itself once superseded.
fn spawn_report_task(
    state: &SharedState,
    st: &mut PlayerState,
    observer: &Arc<dyn PlayerObserver>,
    session: Arc<dyn MediaSession>,
    interval: Duration,
    generation: u64,
) {
    debug_assert!(st.report_task.is_none(), "time-report timer already armed");
    let state = Arc::clone(state);
    let observer = Arc::clone(observer);

    st.report_task = Some(tokio::spawn(async move {
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        loop {
            ticker.tick().await;
            {
                let st = state.lock();
                if st.generation != generation || st.status != PlaybackStatus::Playing {
                    return;
                }
            }
            match session.position().await {
                Ok(position) => observer.current_time(position.as_millis() as u64),
                Err(error) => debug!(%error, "playhead query failed"),
            }
        }
    }));
}
