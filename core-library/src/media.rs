//! # Media Repository
//!
//! Stale-while-revalidate access to lesson media.
//!
//! ## Overview
//!
//! `audio()` and `video()` hand back a `watch` receiver that already holds
//! whatever the local store has for the lesson. A background task then
//! fetches the quarterly listing, keeps the lesson's rows, replaces them in
//! the store and publishes the fresh rows on the same receiver. When the
//! refresh fails the cached value simply stays published.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut audio = repository.audio("en-2023-04-01").await?;
//! render(&audio.borrow());
//! while audio.changed().await.is_ok() {
//!     render(&audio.borrow());
//! }
//! ```

use crate::api::MediaApi;
use crate::error::Result;
use crate::models::{AudioFile, MediaRequest, VideoInfo};
use crate::repositories::{
    AudioRepository, SqliteAudioRepository, SqliteVideoRepository, VideoRepository,
};
use async_trait::async_trait;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const AUDIO: &str = "audio";
const VIDEO: &str = "video";

/// Read access to lesson media plus the duration write-back used by playback.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Cached audio of a lesson, updated once the background refresh lands.
    async fn audio(&self, lesson_index: &str) -> Result<watch::Receiver<Vec<AudioFile>>>;

    /// Cached clip groups of a lesson, updated once the background refresh lands.
    async fn video(&self, lesson_index: &str) -> Result<watch::Receiver<Vec<VideoInfo>>>;

    async fn find_audio_file(&self, id: &str) -> Result<Option<AudioFile>>;

    /// Persist a duration reported by a media backend.
    async fn update_duration(&self, id: &str, duration: Duration) -> Result<()>;

    /// Cached audio of a lesson, without refreshing.
    async fn playlist(&self, lesson_index: &str) -> Result<Vec<AudioFile>>;
}

/// [`MediaRepository`] over the SQLite store and a [`MediaApi`].
#[derive(Clone)]
pub struct DefaultMediaRepository {
    audio: Arc<dyn AudioRepository>,
    video: Arc<dyn VideoRepository>,
    api: Arc<dyn MediaApi>,
    events: Option<EventBus>,
    refresh_on_read: bool,
}

impl DefaultMediaRepository {
    pub fn new(
        audio: Arc<dyn AudioRepository>,
        video: Arc<dyn VideoRepository>,
        api: Arc<dyn MediaApi>,
    ) -> Self {
        Self {
            audio,
            video,
            api,
            events: None,
            refresh_on_read: true,
        }
    }

    /// Repository backed by the SQLite repositories on `pool`.
    pub fn from_pool(pool: SqlitePool, api: Arc<dyn MediaApi>) -> Self {
        Self::new(
            Arc::new(SqliteAudioRepository::new(pool.clone())),
            Arc::new(SqliteVideoRepository::new(pool)),
            api,
        )
    }

    /// Report refreshes and duration updates on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// When disabled, reads only return cached rows.
    pub fn with_refresh_on_read(mut self, enabled: bool) -> Self {
        self.refresh_on_read = enabled;
        self
    }

    /// Fetch the lesson's audio, replace the cached rows and return them.
    ///
    /// Returns `Ok(None)` when the lesson index does not name a quarterly.
    pub async fn refresh_audio(&self, lesson_index: &str) -> Result<Option<Vec<AudioFile>>> {
        let Some(request) = MediaRequest::from_lesson_index(lesson_index) else {
            debug!(lesson_index, "Lesson index has no quarterly, skipping refresh");
            return Ok(None);
        };

        self.emit(LibraryEvent::RefreshStarted {
            lesson_index: lesson_index.to_string(),
            kind: AUDIO.to_string(),
        });

        let result: Result<Vec<AudioFile>> = async {
            let files: Vec<AudioFile> = self
                .api
                .audio(&request)
                .await?
                .into_iter()
                .filter(|file| file.target_index.starts_with(lesson_index))
                .filter(|file| match file.validate() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(lesson_index, error = %e, "Dropping invalid audio row");
                        false
                    }
                })
                .collect();

            self.audio.replace_lesson(lesson_index, &files).await?;
            self.audio.find_by_lesson(lesson_index).await
        }
        .await;

        self.finish_refresh(lesson_index, AUDIO, result).map(Some)
    }

    /// Fetch the lesson's clip groups, replace the cached rows and return them.
    pub async fn refresh_video(&self, lesson_index: &str) -> Result<Option<Vec<VideoInfo>>> {
        let Some(request) = MediaRequest::from_lesson_index(lesson_index) else {
            debug!(lesson_index, "Lesson index has no quarterly, skipping refresh");
            return Ok(None);
        };

        self.emit(LibraryEvent::RefreshStarted {
            lesson_index: lesson_index.to_string(),
            kind: VIDEO.to_string(),
        });

        let result: Result<Vec<VideoInfo>> = async {
            let infos: Vec<VideoInfo> = self
                .api
                .video(&request)
                .await?
                .into_iter()
                .enumerate()
                .map(|(position, remote)| remote.into_video_info(&request, position, lesson_index))
                .collect();

            self.video.replace_lesson(lesson_index, &infos).await?;
            self.video.find_by_lesson(lesson_index).await
        }
        .await;

        self.finish_refresh(lesson_index, VIDEO, result).map(Some)
    }

    fn finish_refresh<T>(
        &self,
        lesson_index: &str,
        kind: &str,
        result: Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        match result {
            Ok(rows) => {
                info!(lesson_index, kind, count = rows.len(), "Media refreshed");
                self.emit(LibraryEvent::RefreshCompleted {
                    lesson_index: lesson_index.to_string(),
                    kind: kind.to_string(),
                    count: rows.len() as u64,
                });
                Ok(rows)
            }
            Err(e) => {
                warn!(lesson_index, kind, error = %e, "Media refresh failed, keeping cached rows");
                self.emit(LibraryEvent::RefreshFailed {
                    lesson_index: lesson_index.to_string(),
                    kind: kind.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn emit(&self, event: LibraryEvent) {
        if let Some(bus) = &self.events {
            // No subscribers is not an error for the repository.
            let _ = bus.emit(CoreEvent::Library(event));
        }
    }
}

#[async_trait]
impl MediaRepository for DefaultMediaRepository {
    async fn audio(&self, lesson_index: &str) -> Result<watch::Receiver<Vec<AudioFile>>> {
        let cached = self.audio.find_by_lesson(lesson_index).await?;
        let (tx, rx) = watch::channel(cached);

        if self.refresh_on_read {
            let this = self.clone();
            let lesson_index = lesson_index.to_string();
            tokio::spawn(async move {
                if let Ok(Some(files)) = this.refresh_audio(&lesson_index).await {
                    let _ = tx.send(files);
                }
            });
        }

        Ok(rx)
    }

    async fn video(&self, lesson_index: &str) -> Result<watch::Receiver<Vec<VideoInfo>>> {
        let cached = self.video.find_by_lesson(lesson_index).await?;
        let (tx, rx) = watch::channel(cached);

        if self.refresh_on_read {
            let this = self.clone();
            let lesson_index = lesson_index.to_string();
            tokio::spawn(async move {
                if let Ok(Some(infos)) = this.refresh_video(&lesson_index).await {
                    let _ = tx.send(infos);
                }
            });
        }

        Ok(rx)
    }

    async fn find_audio_file(&self, id: &str) -> Result<Option<AudioFile>> {
        self.audio.find_by_id(id).await
    }

    async fn update_duration(&self, id: &str, duration: Duration) -> Result<()> {
        let duration_ms = duration.as_millis() as u64;
        self.audio.update_duration(id, duration_ms as i64).await?;

        debug!(media_id = id, duration_ms, "Stored media duration");
        self.emit(LibraryEvent::DurationUpdated {
            media_id: id.to_string(),
            duration_ms,
        });
        Ok(())
    }

    async fn playlist(&self, lesson_index: &str) -> Result<Vec<AudioFile>> {
        self.audio.find_by_lesson(lesson_index).await
    }
}
