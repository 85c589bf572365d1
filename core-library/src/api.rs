//! # Remote Media API
//!
//! Fetches a quarterly's audio and video listings:
//!
//! - `GET {base}/api/v2/{lang}/quarterlies/{quarterly_id}/audio.json`
//! - `GET {base}/api/v2/{lang}/quarterlies/{quarterly_id}/video.json`
//!
//! Listings cover the whole quarterly; callers keep the rows of the lesson
//! they asked for.

use crate::error::{LibraryError, Result};
use crate::models::{AudioFile, MediaRequest, RemoteVideoInfo};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Source of remote media listings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaApi: Send + Sync {
    /// Every audio track of the request's quarterly.
    async fn audio(&self, request: &MediaRequest) -> Result<Vec<AudioFile>>;

    /// Every clip group of the request's quarterly.
    async fn video(&self, request: &MediaRequest) -> Result<Vec<RemoteVideoInfo>>;
}

/// [`MediaApi`] over the host [`HttpClient`].
pub struct HttpMediaApi {
    client: Arc<dyn HttpClient>,
    base_url: String,
    retry_policy: RetryPolicy,
}

impl HttpMediaApi {
    pub fn new(client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn url(&self, request: &MediaRequest, resource: &str) -> String {
        format!(
            "{}/api/v2/{}/quarterlies/{}/{}.json",
            self.base_url, request.language, request.quarterly_id, resource
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let request = HttpRequest::get(&url)
            .accept_json()
            .timeout(REQUEST_TIMEOUT);

        let response = self
            .client
            .execute_with_retry(request, self.retry_policy.clone())
            .await?;

        if !response.is_success() {
            return Err(LibraryError::Api {
                status: response.status,
                url,
            });
        }

        debug!(url = %url, bytes = response.body.len(), "Media listing fetched");
        Ok(serde_json::from_slice(&response.body)?)
    }
}

#[async_trait]
impl MediaApi for HttpMediaApi {
    #[instrument(skip(self), fields(lang = %request.language, quarterly = %request.quarterly_id))]
    async fn audio(&self, request: &MediaRequest) -> Result<Vec<AudioFile>> {
        self.get_json(self.url(request, "audio")).await
    }

    #[instrument(skip(self), fields(lang = %request.language, quarterly = %request.quarterly_id))]
    async fn video(&self, request: &MediaRequest) -> Result<Vec<RemoteVideoInfo>> {
        self.get_json(self.url(request, "video")).await
    }
}
