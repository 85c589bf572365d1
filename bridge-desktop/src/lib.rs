//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest` with rustls
//! - `AudioFocusBroker` arbitrating between sessions of the same process
//!
//! Desktop hosts still provide their own `MediaBackend`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{InProcessFocusBroker, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = Arc::new(ReqwestHttpClient::new()?);
//!     let focus = Arc::new(InProcessFocusBroker::new());
//!
//!     // Use in core configuration
//!     Ok(())
//! }
//! ```

mod focus;
mod http;

pub use focus::InProcessFocusBroker;
pub use http::ReqwestHttpClient;
