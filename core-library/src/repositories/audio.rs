//! Audio repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::AudioFile;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use tracing::debug;

/// Audio repository interface for data access operations
#[async_trait]
pub trait AudioRepository: Send + Sync {
    /// Find a track by id
    ///
    /// # Returns
    /// - `Ok(Some(audio))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &str) -> Result<Option<AudioFile>>;

    /// Tracks whose `target_index` starts with `lesson_index`, in API order
    async fn find_by_lesson(&self, lesson_index: &str) -> Result<Vec<AudioFile>>;

    /// Replace every track under `lesson_index` with `files`.
    ///
    /// Durations already learned for a kept id survive the replacement.
    /// Returns the number of rows written.
    async fn replace_lesson(&self, lesson_index: &str, files: &[AudioFile]) -> Result<usize>;

    /// Store the duration reported by a backend.
    ///
    /// # Errors
    /// Returns `NotFound` if no track has this id
    async fn update_duration(&self, id: &str, duration_ms: i64) -> Result<()>;
}

/// SQLite implementation of AudioRepository
#[derive(Clone)]
pub struct SqliteAudioRepository {
    pool: SqlitePool,
}

impl SqliteAudioRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const SELECT_AUDIO: &str = "SELECT id, artist, image, image_ratio, source, target, target_index, title, duration_ms FROM audio_files";

#[async_trait]
impl AudioRepository for SqliteAudioRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<AudioFile>> {
        let sql = format!("{SELECT_AUDIO} WHERE id = ?");
        let audio = sqlx::query_as::<_, AudioFile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(audio)
    }

    async fn find_by_lesson(&self, lesson_index: &str) -> Result<Vec<AudioFile>> {
        let sql =
            format!("{SELECT_AUDIO} WHERE substr(target_index, 1, length(?)) = ? ORDER BY rowid");
        let files = sqlx::query_as::<_, AudioFile>(&sql)
            .bind(lesson_index)
            .bind(lesson_index)
            .fetch_all(&self.pool)
            .await?;
        Ok(files)
    }

    async fn replace_lesson(&self, lesson_index: &str, files: &[AudioFile]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        let known: HashMap<String, Option<i64>> = sqlx::query_as::<_, (String, Option<i64>)>(
            "SELECT id, duration_ms FROM audio_files WHERE substr(target_index, 1, length(?)) = ?",
        )
        .bind(lesson_index)
        .bind(lesson_index)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        sqlx::query("DELETE FROM audio_files WHERE substr(target_index, 1, length(?)) = ?")
            .bind(lesson_index)
            .bind(lesson_index)
            .execute(&mut *tx)
            .await?;

        for file in files {
            let duration_ms = file
                .duration_ms
                .or_else(|| known.get(&file.id).copied().flatten());

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO audio_files
                    (id, artist, image, image_ratio, source, target, target_index, title, duration_ms)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&file.id)
            .bind(&file.artist)
            .bind(&file.image)
            .bind(&file.image_ratio)
            .bind(&file.source)
            .bind(&file.target)
            .bind(&file.target_index)
            .bind(&file.title)
            .bind(duration_ms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(lesson_index, count = files.len(), "Replaced cached audio");
        Ok(files.len())
    }

    async fn update_duration(&self, id: &str, duration_ms: i64) -> Result<()> {
        let result = sqlx::query("UPDATE audio_files SET duration_ms = ? WHERE id = ?")
            .bind(duration_ms)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LibraryError::not_found("AudioFile", id));
        }
        Ok(())
    }
}
