//! Media backend bridge trait and supporting types.
//!
//! The backend is the host's decode/render engine (ExoPlayer, AVPlayer, a
//! desktop pipeline). The core never decodes anything itself: it issues
//! transport commands through [`MediaBackend`] and reacts to the
//! [`BackendEvent`]s the host pushes back over a channel.
//!
//! Events are delivered by message passing rather than callback registration.
//! The host creates a channel with [`backend_channel`], keeps the
//! [`BackendEventSender`] inside its adapter, and hands the receiver to the
//! playback session that owns the backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::Result;

/// Sending half used by backend adapters to publish events.
pub type BackendEventSender = mpsc::UnboundedSender<BackendEvent>;

/// Receiving half consumed by the playback session.
pub type BackendEventReceiver = mpsc::UnboundedReceiver<BackendEvent>;

/// Create a backend event channel.
///
/// The channel is unbounded so that adapters can publish from native
/// callback threads without awaiting.
pub fn backend_channel() -> (BackendEventSender, BackendEventReceiver) {
    mpsc::unbounded_channel()
}

/// Event emitted by a media backend.
///
/// Events are applied by the session strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum BackendEvent {
    /// The source set with `set_source` finished preparing.
    Prepared,
    /// The backend stalled and is filling its buffer.
    Buffering,
    /// Enough data is buffered to start or continue rendering.
    Ready,
    /// The backend started or stopped rendering.
    IsPlayingChanged { is_playing: bool },
    /// The end of the source was reached.
    Completion,
    /// Decode or render failure. The backend is no longer usable for the
    /// current source.
    Error { cause: String },
}

impl BackendEvent {
    pub fn is_playing_changed(is_playing: bool) -> Self {
        Self::IsPlayingChanged { is_playing }
    }

    pub fn error(cause: impl Into<String>) -> Self {
        Self::Error {
            cause: cause.into(),
        }
    }
}

/// Point-in-time snapshot of the backend's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaClock {
    /// Duration of the current source, when the backend knows it.
    pub duration: Option<Duration>,
    /// Current render position.
    pub position: Duration,
    /// Position up to which media is buffered.
    pub buffered: Duration,
}

impl MediaClock {
    pub fn new(duration: Option<Duration>, position: Duration, buffered: Duration) -> Self {
        Self {
            duration,
            position,
            buffered,
        }
    }
}

/// Transport interface of a host media engine.
///
/// Every method is a command; completion of the command does not imply the
/// resulting state change has happened. State changes are reported through
/// [`BackendEvent`]s.
#[async_trait::async_trait]
pub trait MediaBackend: Send + Sync {
    /// Replace the current source. Resets the backend to an unprepared state.
    async fn set_source(&self, uri: &str) -> Result<()>;

    /// Start preparing the current source. Completion is signalled with
    /// [`BackendEvent::Prepared`].
    async fn prepare(&self) -> Result<()>;

    /// Start or resume rendering.
    async fn play(&self) -> Result<()>;

    /// Pause rendering, keeping the source prepared.
    async fn pause(&self) -> Result<()>;

    /// Stop rendering and drop the prepared state.
    async fn stop(&self) -> Result<()>;

    /// Seek to an absolute position in the current source.
    async fn seek_to(&self, position: Duration) -> Result<()>;

    /// Apply a playback speed multiplier (1.0 is normal speed).
    async fn set_speed(&self, multiplier: f32) -> Result<()>;

    /// Set output volume in `0.0..=1.0`. Used for ducking.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    /// Snapshot of duration, position and buffered position.
    async fn clock(&self) -> Result<MediaClock>;

    /// Release native resources. No other command is issued afterwards.
    async fn release(&self) -> Result<()>;
}
