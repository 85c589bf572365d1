//! # Core Configuration Module
//!
//! Provides configuration management for the lesson media core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the bridges and settings the core needs. It enforces
//! fail-fast validation so that a missing capability is reported at startup
//! rather than on the first playback request.
//!
//! ## Dependencies (with platform defaults)
//!
//! - `HttpClient` - Refreshes the local media store (desktop default: reqwest)
//! - `AudioFocusBroker` - Gates playback start (desktop default: in-process broker)
//!
//! When the `desktop-shims` feature is enabled, desktop defaults are injected
//! automatically if not provided. Mobile hosts must always inject both.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/media.db")
//!     .api_base_url("https://sabbath-school.adventech.io")
//!     .http_client(Arc::new(MyHttpClient))
//!     .focus_broker(Arc::new(MyFocusBroker))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics: the base URL is not an http(s) URL.
//! let config = CoreConfig::builder()
//!     .database_path("/data/media.db")
//!     .api_base_url("ftp://example.com")
//!     .build()
//!     .expect("Should fail - invalid base URL");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{AudioFocusBroker, HttpClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Base URL of the public lesson API.
pub const DEFAULT_API_BASE_URL: &str = "https://sabbath-school.adventech.io";

/// Special database path selecting an in-memory store.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Core configuration for the lesson media core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file, or [`IN_MEMORY_DATABASE`]
    pub database_path: PathBuf,

    /// Base URL of the media API (no trailing slash)
    pub api_base_url: String,

    /// HTTP client used to refresh the media store
    pub http_client: Arc<dyn HttpClient>,

    /// Audio focus broker shared by all playback sessions
    pub focus_broker: Arc<dyn AudioFocusBroker>,

    /// Capacity of the event bus
    pub event_buffer_size: usize,

    /// Features flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("api_base_url", &self.api_base_url)
            .field("http_client", &"HttpClient { ... }")
            .field("focus_broker", &"AudioFocusBroker { ... }")
            .field("event_buffer_size", &self.event_buffer_size)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Refresh cached media from the network whenever it is read
    pub refresh_on_read: bool,

    /// Publish playback transitions on the event bus
    pub playback_events: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            refresh_on_read: true,
            playback_events: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Whether the database lives only in memory.
    pub fn is_in_memory_database(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY_DATABASE)
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - API base URL is an http(s) URL without a trailing slash
    /// - Event buffer size is within 1..=10_000
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://"))
        {
            return Err(Error::Config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }

        if self.api_base_url.ends_with('/') {
            return Err(Error::Config(
                "API base URL must not end with '/'".to_string(),
            ));
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > 10_000 {
            return Err(Error::Config(format!(
                "Event buffer size must be between 1 and 10000, got {}",
                self.event_buffer_size
            )));
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    Ok(Arc::new(ReqwestHttpClient::new()?))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required to refresh the media store. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_focus_broker() -> Result<Arc<dyn AudioFocusBroker>> {
    use bridge_desktop::InProcessFocusBroker;

    Ok(Arc::new(InProcessFocusBroker::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_focus_broker() -> Result<Arc<dyn AudioFocusBroker>> {
    Err(Error::CapabilityMissing {
        capability: "AudioFocusBroker".to_string(),
        message: "AudioFocusBroker implementation is required to gate playback. \
                 Desktop: enable the 'desktop-shims' feature to use InProcessFocusBroker. \
                 Android: wrap AudioManager focus requests. iOS: wrap AVAudioSession."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    focus_broker: Option<Arc<dyn AudioFocusBroker>>,
    event_buffer_size: Option<usize>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/data/media.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Keeps the media store in memory. Useful for tests and previews.
    pub fn in_memory_database(mut self) -> Self {
        self.database_path = Some(PathBuf::from(IN_MEMORY_DATABASE));
        self
    }

    /// Sets the media API base URL.
    ///
    /// Default: [`DEFAULT_API_BASE_URL`]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) is used when the
    /// `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the audio focus broker.
    ///
    /// If not provided, the in-process broker is used when the
    /// `desktop-shims` feature is enabled.
    pub fn focus_broker(mut self, broker: Arc<dyn AudioFocusBroker>) -> Self {
        self.focus_broker = Some(broker);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: [`DEFAULT_EVENT_BUFFER_SIZE`]
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Enables or disables refresh-on-read for cached media.
    ///
    /// Default: true
    pub fn refresh_on_read(mut self, enabled: bool) -> Self {
        self.features.refresh_on_read = enabled;
        self
    }

    /// Enables or disables playback events on the event bus.
    ///
    /// Default: true
    pub fn playback_events(mut self, enabled: bool) -> Self {
        self.features.playback_events = enabled;
        self
    }

    /// Sets all feature flags at once.
    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(CoreConfig)` on success, or an error if:
    /// - The database path is missing
    /// - A bridge is missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let focus_broker = match self.focus_broker {
            Some(broker) => broker,
            None => provide_default_focus_broker()?,
        };

        let config = CoreConfig {
            database_path,
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            http_client,
            focus_broker,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        BridgeError, FocusGrant, FocusHolderId, FocusRequest, HttpRequest, HttpResponse,
    };

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    struct MockFocusBroker;

    #[async_trait]
    impl AudioFocusBroker for MockFocusBroker {
        async fn request(
            &self,
            _request: FocusRequest,
        ) -> std::result::Result<FocusGrant, BridgeError> {
            Ok(FocusGrant::Granted)
        }

        async fn abandon(&self, _holder: FocusHolderId) -> std::result::Result<(), BridgeError> {
            Ok(())
        }
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/tmp/media.db")
            .http_client(Arc::new(MockHttpClient))
            .focus_broker(Arc::new(MockFocusBroker))
    }

    #[test]
    fn test_builder_with_all_required_fields() {
        let config = builder().build().unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/media.db"));
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.features.refresh_on_read);
        assert!(!config.is_in_memory_database());
    }

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder()
            .http_client(Arc::new(MockHttpClient))
            .focus_broker(Arc::new(MockFocusBroker))
            .build();

        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("Database path is required")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_focus_broker_without_shims() {
        let result = CoreConfig::builder()
            .database_path("/tmp/media.db")
            .http_client(Arc::new(MockHttpClient))
            .build();

        match result {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "AudioFocusBroker")
            }
            other => panic!("expected missing capability, got {:?}", other),
        }
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = CoreConfig::builder()
            .in_memory_database()
            .build()
            .expect("desktop defaults should succeed");

        assert!(config.is_in_memory_database());
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let result = builder().api_base_url("ftp://example.com").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_trailing_slash() {
        let result = builder().api_base_url("https://example.com/").build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_buffer_size() {
        assert!(builder().event_buffer_size(0).build().is_err());
        assert!(builder().event_buffer_size(10_001).build().is_err());
        assert!(builder().event_buffer_size(256).build().is_ok());
    }

    #[test]
    fn test_builder_with_feature_flags() {
        let config = builder()
            .refresh_on_read(false)
            .playback_events(false)
            .build()
            .unwrap();

        assert_eq!(
            config.features,
            FeatureFlags {
                refresh_on_read: false,
                playback_events: false,
            }
        );
    }

    #[test]
    fn test_config_debug_hides_bridges() {
        let config = builder().build().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("HttpClient { ... }"));
        assert!(debug.contains("/tmp/media.db"));
    }
}
