//! # Local Media Store
//!
//! Repository traits over the SQLite cache and their `sqlx` implementations.
//!
//! ## Available Repositories
//!
//! - `AudioRepository` - Audio tracks keyed by id, read by lesson prefix
//! - `VideoRepository` - Clip groups keyed by lesson index
//!
//! Both replace a lesson's rows atomically, so readers see either the old
//! set or the refreshed one.

pub mod audio;
pub mod video;

pub use audio::{AudioRepository, SqliteAudioRepository};
pub use video::{SqliteVideoRepository, VideoRepository};
