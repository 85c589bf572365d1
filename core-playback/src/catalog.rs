//! # Media Catalog
//!
//! The session's view of the library: resolve ids to playable items, list a
//! queue, and write back durations learned from the backend.

use crate::error::Result;
use async_trait::async_trait;
use core_library::media::MediaRepository;
use core_library::models::{AudioFile, VideoClip};
use std::sync::Arc;
use std::time::Duration;

/// A resolved, playable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    pub artist: String,
    /// URI handed to `MediaBackend::set_source`.
    pub uri: String,
    pub artwork: Option<String>,
    pub duration: Option<Duration>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            artist: String::new(),
            uri: uri.into(),
            artwork: None,
            duration: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

impl From<AudioFile> for MediaItem {
    fn from(audio: AudioFile) -> Self {
        let duration = audio.duration();
        Self {
            id: audio.id,
            title: audio.title,
            artist: audio.artist,
            uri: audio.source,
            artwork: (!audio.image.is_empty()).then_some(audio.image),
            duration,
        }
    }
}

impl From<&VideoClip> for MediaItem {
    fn from(clip: &VideoClip) -> Self {
        Self {
            id: clip.id.clone(),
            title: clip.title.clone(),
            artist: clip.artist.clone(),
            uri: clip.src.clone(),
            artwork: (!clip.thumbnail.is_empty()).then(|| clip.thumbnail.clone()),
            duration: None,
        }
    }
}

/// Library lookups a playback session depends on.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn find_media_item(&self, id: &str) -> Result<Option<MediaItem>>;

    /// Items of a scope (a lesson index) in playback order.
    async fn queue_items(&self, scope_id: &str) -> Result<Vec<MediaItem>>;

    async fn record_duration(&self, id: &str, duration: Duration) -> Result<()>;
}

/// [`MediaCatalog`] backed by the lesson media repository.
pub struct LibraryCatalog {
    repository: Arc<dyn MediaRepository>,
}

impl LibraryCatalog {
    pub fn new(repository: Arc<dyn MediaRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl MediaCatalog for LibraryCatalog {
    async fn find_media_item(&self, id: &str) -> Result<Option<MediaItem>> {
        Ok(self
            .repository
            .find_audio_file(id)
            .await?
            .map(MediaItem::from))
    }

    async fn queue_items(&self, scope_id: &str) -> Result<Vec<MediaItem>> {
        Ok(self
            .repository
            .playlist(scope_id)
            .await?
            .into_iter()
            .map(MediaItem::from)
            .collect())
    }

    async fn record_duration(&self, id: &str, duration: Duration) -> Result<()> {
        Ok(self.repository.update_duration(id, duration).await?)
    }
}
