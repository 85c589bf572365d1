//! Video repository trait and implementation

use crate::error::Result;
use crate::models::{VideoClip, VideoInfo};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

/// Video repository interface for data access operations
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Find a clip group by id
    async fn find_by_id(&self, id: &str) -> Result<Option<VideoInfo>>;

    /// Clip groups cached for exactly `lesson_index`, in API order
    async fn find_by_lesson(&self, lesson_index: &str) -> Result<Vec<VideoInfo>>;

    /// Replace the clip groups of `lesson_index` with `infos`.
    async fn replace_lesson(&self, lesson_index: &str, infos: &[VideoInfo]) -> Result<usize>;
}

/// SQLite implementation of VideoRepository
#[derive(Clone)]
pub struct SqliteVideoRepository {
    pool: SqlitePool,
}

impl SqliteVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// Clips are stored as a JSON array in a TEXT column.
#[derive(FromRow)]
struct VideoRow {
    id: String,
    artist: String,
    clips: String,
    lesson_index: String,
}

impl VideoRow {
    fn into_info(self) -> Result<VideoInfo> {
        let clips: Vec<VideoClip> = serde_json::from_str(&self.clips)?;
        Ok(VideoInfo {
            id: self.id,
            artist: self.artist,
            clips,
            lesson_index: self.lesson_index,
        })
    }
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<VideoInfo>> {
        sqlx::query_as::<_, VideoRow>(
            "SELECT id, artist, clips, lesson_index FROM video_infos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(VideoRow::into_info)
        .transpose()
    }

    async fn find_by_lesson(&self, lesson_index: &str) -> Result<Vec<VideoInfo>> {
        sqlx::query_as::<_, VideoRow>(
            "SELECT id, artist, clips, lesson_index FROM video_infos WHERE lesson_index = ? ORDER BY rowid",
        )
        .bind(lesson_index)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(VideoRow::into_info)
        .collect()
    }

    async fn replace_lesson(&self, lesson_index: &str, infos: &[VideoInfo]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM video_infos WHERE lesson_index = ?")
            .bind(lesson_index)
            .execute(&mut *tx)
            .await?;

        for info in infos {
            let clips = serde_json::to_string(&info.clips)?;
            sqlx::query(
                "INSERT OR REPLACE INTO video_infos (id, artist, clips, lesson_index) VALUES (?, ?, ?, ?)",
            )
            .bind(&info.id)
            .bind(&info.artist)
            .bind(clips)
            .bind(&info.lesson_index)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(lesson_index, count = infos.len(), "Replaced cached videos");
        Ok(infos.len())
    }
}
