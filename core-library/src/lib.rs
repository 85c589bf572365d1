//! # Lesson Media Library
//!
//! Owns the local media store and keeps it in step with the remote API.
//!
//! ## Overview
//!
//! This crate manages:
//! - SQLite schema, migrations and the connection pool ([`db`])
//! - Audio and video repositories over the store ([`repositories`])
//! - The remote listing API ([`api`])
//! - The stale-while-revalidate [`MediaRepository`] used by playback ([`media`])

pub mod api;
pub mod db;
pub mod error;
pub mod media;
pub mod models;
pub mod repositories;

pub use api::{HttpMediaApi, MediaApi};
pub use db::{create_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use media::{DefaultMediaRepository, MediaRepository};
pub use models::{AudioFile, MediaRequest, RemoteVideoInfo, VideoClip, VideoInfo};
