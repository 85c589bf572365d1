//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host, expressed as traits.
//!
//! ## Overview
//!
//! The core coordinates playback but never renders media, never talks to the
//! OS audio stack and never opens sockets itself. Each of those concerns is a
//! bridge trait implemented per platform (desktop, Android, iOS).
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaBackend`](media::MediaBackend) - Transport commands for the host media engine
//! - [`BackendEvent`](media::BackendEvent) - Events the engine publishes back over a channel
//! - [`AudioFocusBroker`](focus::AudioFocusBroker) - Host audio focus arbitration
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry policy
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ HTTP, focus |
//! | Android  | host app            | 📋 Planned |
//! | iOS      | host app            | 📋 Planned |
//!
//! The media backend is always host-provided; there is no desktop default.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with an actionable message.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::media::{BackendEvent, BackendEventSender, MediaBackend, MediaClock};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct NativePlayer {
//!     events: BackendEventSender,
//! }
//!
//! #[async_trait]
//! impl MediaBackend for NativePlayer {
//!     async fn prepare(&self) -> Result<()> {
//!         // Kick off native preparation, then from the native callback:
//!         let _ = self.events.send(BackendEvent::Prepared);
//!         Ok(())
//!     }
//!     // ...
//! }
//! ```

pub mod error;
pub mod focus;
pub mod http;
pub mod logging;
pub mod media;

pub use error::BridgeError;

// Re-export commonly used types
pub use focus::{
    AudioFocusBroker, FocusChange, FocusGrant, FocusHolderId, FocusKind, FocusListener,
    FocusRequest,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use media::{
    backend_channel, BackendEvent, BackendEventReceiver, BackendEventSender, MediaBackend,
    MediaClock,
};
pub use logging::{LogEntry, LogLevel, LoggerSink, StderrLogger};
