//! # Playback Coordination
//!
//! Drives a platform media backend on behalf of a lesson player.
//!
//! ## Overview
//!
//! This crate handles:
//! - The playback session state machine ([`PlaybackSession`])
//! - Playlist position and repeat handling ([`QueueManager`])
//! - Audio focus arbitration with other applications ([`FocusArbiter`])
//! - Speed-aware progress reporting ([`ProgressTicker`])
//!
//! The backend itself (decoding, rendering, output) lives behind
//! [`bridge_traits::MediaBackend`]; media metadata comes from a
//! [`MediaCatalog`], normally the lesson library.

pub mod catalog;
pub mod config;
pub mod error;
pub mod focus;
pub mod queue;
pub mod session;
pub mod speed;
pub mod state;
pub mod ticker;

pub use catalog::{LibraryCatalog, MediaCatalog, MediaItem};
pub use config::PlaybackConfig;
pub use error::{PlaybackError, Result};
pub use focus::{FocusAction, FocusArbiter};
pub use queue::QueueManager;
pub use session::{PlaybackSession, SessionBuilder};
pub use speed::PlaybackSpeed;
pub use state::{PlaybackProgressState, PlaybackState, PlaybackStatus, RepeatMode};
pub use ticker::ProgressTicker;
