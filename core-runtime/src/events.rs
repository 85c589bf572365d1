//! # Event Bus System
//!
//! Broadcasts typed events between the playback core, the media library and
//! the host UI, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps one enum per domain
//! - **EventBus**: cloneable publisher handle
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! Playback *state* is not carried here. Sessions publish state through
//! watch cells that always hold the latest value; the bus carries discrete
//! notifications (a track started, a refresh failed) that hosts may log,
//! surface as toasts or forward to analytics.
//!
//! ```text
//! ┌──────────────────┐  emit   ┌──────────┐  subscribe  ┌────────────┐
//! │ PlaybackSession  ├────────>│          ├────────────>│ Host UI    │
//! └──────────────────┘         │ EventBus │             └────────────┘
//! ┌──────────────────┐  emit   │          │  subscribe  ┌────────────┐
//! │ MediaRepository  ├────────>│          ├────────────>│ Logger     │
//! └──────────────────┘         └──────────┘             └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!         media_id: "en-2023-04-01-01".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Media completed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: every sender is gone; treat as shutdown.
//!
//! `emit` fails only when nobody is subscribed. Publishers ignore that case.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that fall further behind receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback session notifications
    Playback(PlaybackEvent),
    /// Media store and refresh notifications
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Library(LibraryEvent::RefreshFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::FocusLost { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::RefreshCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Discrete notifications emitted by playback sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Rendering of a media item began.
    Started {
        media_id: String,
        title: String,
    },
    /// Playback paused.
    Paused {
        media_id: String,
        /// Position when paused (milliseconds).
        position_ms: u64,
    },
    /// Playback resumed after a pause.
    Resumed {
        media_id: String,
        position_ms: u64,
    },
    /// Playback stopped. `by_user` is false for stops the user cannot resume.
    Stopped {
        media_id: Option<String>,
        by_user: bool,
    },
    /// The current media item finished.
    Completed { media_id: String },
    /// Position changed by a seek, fast-forward or rewind.
    Seeked {
        media_id: Option<String>,
        position_ms: u64,
        duration_ms: Option<u64>,
    },
    /// Speed multiplier changed, expressed in percent (150 = 1.5x).
    SpeedChanged { multiplier_percent: u32 },
    /// Another holder took audio focus.
    FocusLost {
        media_id: Option<String>,
        transient: bool,
    },
    /// Playback error occurred.
    Error {
        media_id: Option<String>,
        message: String,
        /// Whether repeating the originating command may succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Media completed",
            PlaybackEvent::Seeked { .. } => "Playback position changed",
            PlaybackEvent::SpeedChanged { .. } => "Playback speed changed",
            PlaybackEvent::FocusLost { .. } => "Audio focus lost",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to the local media store and its network refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Background refresh of a lesson's media started.
    RefreshStarted {
        /// Lesson index being refreshed (e.g. "en-2023-04-01").
        lesson_index: String,
        /// "audio" or "video".
        kind: String,
    },
    /// Background refresh replaced the cached rows.
    RefreshCompleted {
        lesson_index: String,
        kind: String,
        /// Number of rows now cached for the lesson.
        count: u64,
    },
    /// Background refresh failed; cached rows were kept.
    RefreshFailed {
        lesson_index: String,
        kind: String,
        message: String,
    },
    /// A media item's duration was learned from the backend.
    DurationUpdated { media_id: String, duration_ms: u64 },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::RefreshStarted { .. } => "Media refresh started",
            LibraryEvent::RefreshCompleted { .. } => "Media refresh completed",
            LibraryEvent::RefreshFailed { .. } => "Media refresh failed",
            LibraryEvent::DurationUpdated { .. } => "Media duration updated",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Cloneable publisher handle.
///
/// A receiver from [`EventBus::subscribe`] sees only events emitted after
/// it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` bounds how far a subscriber may fall behind before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns how many subscribers got the event. Errs when there are none,
    /// which publishers treat as a no-op.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let bus = EventBus::new(16);
    /// let _host = bus.subscribe();
    /// assert_eq!(bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
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
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let playback_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Keeps events at or above `min` severity.
    pub fn min_severity(self, min: EventSeverity) -> Self {
        self.filter(move |event| event.severity() >= min)
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Next event passing the filter. Lag and closure surface as
    /// [`RecvError`] exactly as on the raw receiver.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking [`recv`](Self::recv); `None` once the buffer is drained.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn completed(id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Completed {
            media_id: id.to_string(),
        })
    }

    fn refresh_failed() -> CoreEvent {
        CoreEvent::Library(LibraryEvent::RefreshFailed {
            lesson_index: "en-2023-04-01".to_string(),
            kind: "audio".to_string(),
            message: "HTTP 503 error".to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed("a1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(completed("a1")).unwrap(), 2);
        assert_eq!(sub1.recv().await.unwrap(), completed("a1"));
        assert_eq!(sub2.recv().await.unwrap(), completed("a1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Library(_)));

        bus.emit(completed("a1")).unwrap();
        bus.emit(refresh_failed()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), refresh_failed());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_event_stream_min_severity() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe()).min_severity(EventSeverity::Warning);

        bus.emit(completed("a1")).unwrap();
        bus.emit(refresh_failed()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), refresh_failed());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(completed(&format!("a{}", i))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(sub.recv().await.unwrap(), completed("a3"));
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(refresh_failed().severity(), EventSeverity::Warning);
        assert_eq!(completed("a1").severity(), EventSeverity::Debug);
        assert_eq!(
            CoreEvent::Playback(PlaybackEvent::Error {
                media_id: None,
                message: "decoder".to_string(),
                recoverable: false,
            })
            .severity(),
            EventSeverity::Error
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::Paused {
            media_id: "a1".to_string(),
            position_ms: 1500,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"Playback","payload":{"event":"Paused","media_id":"a1","position_ms":1500}}"#
        );

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }
}
