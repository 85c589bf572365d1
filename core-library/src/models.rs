//! Domain models for lesson media
//!
//! The same types serve as API payloads (camelCase JSON) and as cached
//! rows in the local store.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;

// =============================================================================
// Requests
// =============================================================================

/// Language and quarterly a lesson's media is published under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRequest {
    pub language: String,
    pub quarterly_id: String,
}

impl MediaRequest {
    /// Derive the request from a lesson index such as `en-2023-04-01`.
    ///
    /// The last `-` segment (the lesson number) is dropped to get the
    /// quarterly index `en-2023-04`, whose first segment is the language.
    ///
    /// ```rust,ignore
    /// let request = MediaRequest::from_lesson_index("en-2023-04-01").unwrap();
    /// assert_eq!(request.language, "en");
    /// assert_eq!(request.quarterly_id, "2023-04");
    /// ```
    pub fn from_lesson_index(lesson_index: &str) -> Option<Self> {
        let (quarterly_index, _) = lesson_index.rsplit_once('-')?;
        let (language, quarterly_id) = quarterly_index.split_once('-')?;
        if language.is_empty() || quarterly_id.is_empty() {
            return None;
        }

        Some(Self {
            language: language.to_string(),
            quarterly_id: quarterly_id.to_string(),
        })
    }

    /// `{language}-{quarterly_id}`
    pub fn quarterly_index(&self) -> String {
        format!("{}-{}", self.language, self.quarterly_id)
    }
}

// =============================================================================
// Audio
// =============================================================================

/// A single audio track attached to a lesson (or a day of a lesson).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AudioFile {
    pub id: String,
    pub artist: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub image_ratio: String,
    /// Playable URI handed to the media backend.
    #[serde(rename = "src")]
    pub source: String,
    pub target: String,
    /// Lesson index this track belongs to, e.g. `en-2023-04-01`.
    pub target_index: String,
    pub title: String,
    /// Duration learned from the backend; the API never sends it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl AudioFile {
    /// Known duration, if a backend has reported one.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_ms
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms as u64))
    }

    /// Reject rows the store cannot key or the backend cannot play.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: "Audio id cannot be empty".to_string(),
            });
        }
        if self.source.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "src".to_string(),
                message: format!("Audio {} has no source", self.id),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Video
// =============================================================================

/// A playable video clip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoClip {
    pub id: String,
    pub artist: String,
    pub src: String,
    pub target: String,
    pub target_index: String,
    #[serde(default)]
    pub thumbnail: String,
    pub title: String,
}

/// A group of clips by one artist, cached per lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// `{language}-{quarterly_id}-{position}`
    pub id: String,
    pub artist: String,
    pub clips: Vec<VideoClip>,
    pub lesson_index: String,
}

/// Clip group as served by the API, before it is keyed to a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVideoInfo {
    pub artist: String,
    #[serde(default)]
    pub clips: Vec<VideoClip>,
}

impl RemoteVideoInfo {
    /// Key the group for `lesson_index`; `position` is its index in the response.
    pub fn into_video_info(
        self,
        request: &MediaRequest,
        position: usize,
        lesson_index: &str,
    ) -> VideoInfo {
        VideoInfo {
            id: format!("{}-{}", request.quarterly_index(), position),
            artist: self.artist,
            clips: self.clips,
            lesson_index: lesson_index.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_request_from_lesson_index() {
        let request = MediaRequest::from_lesson_index("en-2023-04-01").unwrap();
        assert_eq!(request.language, "en");
        assert_eq!(request.quarterly_id, "2023-04");
        assert_eq!(request.quarterly_index(), "en-2023-04");
    }

    #[test]
    fn test_media_request_keeps_quarterly_suffixes() {
        let request = MediaRequest::from_lesson_index("es-2023-04-cq-07").unwrap();
        assert_eq!(request.language, "es");
        assert_eq!(request.quarterly_id, "2023-04-cq");
    }

    #[test]
    fn test_media_request_rejects_malformed_index() {
        assert_eq!(MediaRequest::from_lesson_index(""), None);
        assert_eq!(MediaRequest::from_lesson_index("en"), None);
        assert_eq!(MediaRequest::from_lesson_index("en-01"), None);
        assert_eq!(MediaRequest::from_lesson_index("-2023-04-01"), None);
    }

    #[test]
    fn test_audio_file_from_api_json() {
        let json = r#"{
            "id": "a1",
            "artist": "Narrator",
            "image": "https://cdn/cover.png",
            "imageRatio": "square",
            "src": "https://cdn/a1.mp3",
            "target": "en/2023-04/01",
            "targetIndex": "en-2023-04-01",
            "title": "Sabbath Afternoon"
        }"#;

        let audio: AudioFile = serde_json::from_str(json).unwrap();
        assert_eq!(audio.source, "https://cdn/a1.mp3");
        assert_eq!(audio.image_ratio, "square");
        assert_eq!(audio.target_index, "en-2023-04-01");
        assert_eq!(audio.duration(), None);
        assert!(audio.validate().is_ok());
    }

    #[test]
    fn test_audio_file_duration_ignores_non_positive() {
        let mut audio: AudioFile = serde_json::from_value(serde_json::json!({
            "id": "a1", "artist": "", "src": "s", "target": "", "targetIndex": "", "title": ""
        }))
        .unwrap();

        audio.duration_ms = Some(0);
        assert_eq!(audio.duration(), None);

        audio.duration_ms = Some(90_500);
        assert_eq!(audio.duration(), Some(Duration::from_millis(90_500)));
    }

    #[test]
    fn test_audio_file_validation() {
        let audio: AudioFile = serde_json::from_value(serde_json::json!({
            "id": "a1", "artist": "", "src": " ", "target": "", "targetIndex": "", "title": ""
        }))
        .unwrap();

        assert!(matches!(
            audio.validate(),
            Err(LibraryError::InvalidInput { field, .. }) if field == "src"
        ));
    }

    #[test]
    fn test_remote_video_info_keyed_by_position() {
        let request = MediaRequest::from_lesson_index("en-2023-04-01").unwrap();
        let remote = RemoteVideoInfo {
            artist: "Hope Channel".to_string(),
            clips: vec![],
        };

        let info = remote.into_video_info(&request, 2, "en-2023-04-01");
        assert_eq!(info.id, "en-2023-04-2");
        assert_eq!(info.lesson_index, "en-2023-04-01");
    }
}
