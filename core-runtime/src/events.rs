//! # Event Bus System
//!
//! Event-driven delivery of UI-visible state changes using
//! `tokio::sync::broadcast`. Catalog mutations, download progress and
//! playback transitions are published here; the host drains its
//! subscription on the main execution context and redraws from there.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Progress {
//!     record_id: 42,
//!     fraction: 0.5,
//! }))
//! .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.severity(), core_runtime::events::EventSeverity::Debug);
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `RecvError::Lagged(n)` means a slow subscriber missed `n` events and is
//! non-fatal; `RecvError::Closed` means every sender is gone and signals
//! shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall behind by more than this receive
/// `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Catalog and playlist events
    Catalog(CatalogEvent),
    /// File download events
    Download(DownloadEvent),
    /// Playback events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Catalog(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Catalog(CatalogEvent::RecordBroken { .. }) => EventSeverity::Error,
            CoreEvent::Download(DownloadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Catalog(CatalogEvent::Refreshed { .. }) => EventSeverity::Info,
            CoreEvent::Catalog(CatalogEvent::Restored { .. }) => EventSeverity::Info,
            CoreEvent::Download(DownloadEvent::Completed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Catalog Events
// ============================================================================

/// Events related to the catalog and the playlist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum CatalogEvent {
    /// The remote catalog was downloaded and the record set replaced.
    Refreshed {
        /// Number of records now known.
        record_count: usize,
    },
    /// Persisted state was reloaded at startup.
    Restored {
        /// Number of records restored.
        record_count: usize,
        /// Number of playlist members restored.
        playlist_len: usize,
    },
    /// A record was added to the playlist.
    RecordAdded {
        /// The record id.
        record_id: u64,
    },
    /// A record was removed from the playlist.
    RecordRemoved {
        /// The record id.
        record_id: u64,
    },
    /// A record turned out to have no playable media.
    RecordBroken {
        /// The record id.
        record_id: u64,
        /// Why the record is unplayable.
        reason: String,
    },
}

impl CatalogEvent {
    fn description(&self) -> &str {
        match self {
            CatalogEvent::Refreshed { .. } => "Catalog refreshed",
            CatalogEvent::Restored { .. } => "Persisted state restored",
            CatalogEvent::RecordAdded { .. } => "Record added to playlist",
            CatalogEvent::RecordRemoved { .. } => "Record removed from playlist",
            CatalogEvent::RecordBroken { .. } => "Record has no playable media",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events related to background media downloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A transfer was started for a record.
    Started {
        /// The record id.
        record_id: u64,
        /// Local file name the media will be stored under.
        file_name: String,
    },
    /// Throttled progress update. Fractions are non-decreasing per record
    /// and never emitted after the terminal event.
    Progress {
        /// The record id.
        record_id: u64,
        /// Completed fraction in `[0, 1]`.
        fraction: f32,
    },
    /// The file was downloaded and moved into place.
    Completed {
        /// The record id.
        record_id: u64,
    },
    /// The transfer failed.
    Failed {
        /// The record id.
        record_id: u64,
        /// Human-readable error message.
        message: String,
    },
    /// The transfer was cancelled by the user.
    Cancelled {
        /// The record id.
        record_id: u64,
    },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Progress { .. } => "Download in progress",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Cancelled { .. } => "Download cancelled",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to the playback state machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// The player status changed.
    StatusChanged {
        /// New status, rendered for display (e.g. "playing").
        status: String,
    },
    /// The track duration became known.
    DurationDetected {
        /// Duration in milliseconds.
        duration_ms: u64,
    },
    /// Periodic playhead report while playing.
    CurrentTime {
        /// Position in milliseconds.
        position_ms: u64,
    },
    /// A playback error was raised.
    Error {
        /// Human-readable error message.
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::StatusChanged { .. } => "Playback status changed",
            PlaybackEvent::DurationDetected { .. } => "Track duration detected",
            PlaybackEvent::CurrentTime { .. } => "Playback position changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Uses `tokio::sync::broadcast` internally: multiple producers (clone the
/// bus), multiple independent consumers (each `subscribe()`), non-blocking
/// sends, lagging detection for slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber receiving all future events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_creation() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        let event = CoreEvent::Catalog(CatalogEvent::RecordAdded { record_id: 1 });

        // Should error when no subscribers
        assert!(bus.emit(event).is_err());
    }

    #[tokio::test]
    async fn test_event_emission_with_subscribers() {
        let bus = EventBus::new(10);
        let mut sub = bus.subscribe();

        let event = CoreEvent::Download(DownloadEvent::Started {
            record_id: 42,
            file_name: "y.mp3".to_string(),
        });

        let result = bus.emit(event.clone());
        assert_eq!(result.unwrap(), 1);

        let received = sub.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Playback(PlaybackEvent::StatusChanged {
            status: "playing".to_string(),
        });

        bus.emit(event.clone()).ok();

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2); // Very small buffer
        let mut sub = bus.subscribe();

        for i in 0..5 {
            let event = CoreEvent::Download(DownloadEvent::Progress {
                record_id: 1,
                fraction: i as f32 / 5.0,
            });
            bus.emit(event).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let error_event = CoreEvent::Download(DownloadEvent::Failed {
            record_id: 3,
            message: "no response from server".to_string(),
        });
        assert_eq!(error_event.severity(), EventSeverity::Error);

        let info_event = CoreEvent::Catalog(CatalogEvent::Refreshed { record_count: 812 });
        assert_eq!(info_event.severity(), EventSeverity::Info);

        let debug_event = CoreEvent::Playback(PlaybackEvent::CurrentTime { position_ms: 5000 });
        assert_eq!(debug_event.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_description() {
        let event = CoreEvent::Catalog(CatalogEvent::RecordBroken {
            record_id: 9,
            reason: "empty manifest".to_string(),
        });
        assert_eq!(event.description(), "Record has no playable media");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Download(DownloadEvent::Progress {
            record_id: 42,
            fraction: 0.5,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("42"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }
}
