//! Observable session state.
//!
//! Sessions publish [`PlaybackState`] and [`PlaybackProgressState`] through
//! `watch` channels; both are plain values cloned out to observers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    /// Nothing loaded, or stopped by the user.
    #[default]
    Idle,
    /// Waiting for the backend to have enough media to render.
    Buffering,
    /// Prepared and able to play immediately.
    Ready,
    Playing,
    Paused,
    /// Stopped by the system; cannot be resumed without a new `play`.
    Stopped,
    /// The last item of the queue finished.
    Ended,
    Error,
}

/// What happens when an item completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Advance through the queue and end after the last item.
    #[default]
    None,
    /// Replay the current item.
    One,
    /// Advance through the queue, wrapping to the first item.
    All,
}

/// Snapshot of a playback session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub is_playing: bool,
    pub media_id: Option<String>,
    pub title: Option<String>,
    /// Last known position.
    pub position: Duration,
    pub duration: Option<Duration>,
    pub current_index: Option<usize>,
    pub has_previous: bool,
    pub has_next: bool,
    pub repeat_mode: RepeatMode,
    /// Message of the error that put the session in `Error`.
    pub error: Option<String>,
}

impl PlaybackState {
    pub fn is_buffering(&self) -> bool {
        self.status == PlaybackStatus::Buffering
    }

    pub fn has_ended(&self) -> bool {
        self.status == PlaybackStatus::Ended
    }

    /// Playing, or about to once buffering completes.
    pub fn is_active(&self) -> bool {
        self.is_playing || self.is_buffering()
    }

    /// Whether progress should tick.
    pub fn is_progressing(&self) -> bool {
        self.status == PlaybackStatus::Playing && self.is_playing
    }
}

/// Progress of the current item.
///
/// `position` is the backend position when the snapshot was taken and
/// `elapsed` the media time played since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackProgressState {
    pub duration: Duration,
    pub position: Duration,
    pub buffered: Duration,
    pub elapsed: Duration,
}

impl PlaybackProgressState {
    /// `position + elapsed`, never past the end.
    pub fn current_position(&self) -> Duration {
        (self.position + self.elapsed).min(self.duration)
    }

    /// Played fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.current_position().as_secs_f64() / self.duration.as_secs_f64()) as f32
    }

    /// Buffered fraction in `0.0..=1.0`.
    pub fn buffered_fraction(&self) -> f32 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.buffered.min(self.duration).as_secs_f64() / self.duration.as_secs_f64()) as f32
    }
}
