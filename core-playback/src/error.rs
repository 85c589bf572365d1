//! # Playback Error Types
//!
//! Errors surfaced by playback sessions.

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Requested media id is absent from the catalog.
    #[error("Media not found: {0}")]
    NotFound(String),

    /// The media backend rejected a command or reported a render error.
    #[error("Media backend failure: {0}")]
    BackendFailure(String),

    /// The focus broker declined the request; playback did not start.
    #[error("Audio focus denied")]
    FocusDenied,

    /// The session was released, or released while the command was in flight.
    #[error("Playback session closed")]
    SessionClosed,

    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Library error from core-library.
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),
}

impl From<BridgeError> for PlaybackError {
    fn from(error: BridgeError) -> Self {
        PlaybackError::BackendFailure(error.to_string())
    }
}

impl PlaybackError {
    /// Returns `true` if repeating the originating command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::FocusDenied | PlaybackError::Library(LibraryError::Bridge(_))
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
