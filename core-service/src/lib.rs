//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridges (HTTP, audio focus, the media
//! engine) into the shared Rust core. Desktop apps typically enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) so the HTTP
//! client and focus broker have in-process defaults; mobile hosts pass their
//! own implementations through [`CoreConfig`].
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .database_path("/data/lessons.db")
//!     .build()?;
//! let core = MediaCore::new(config, PlaybackConfig::default()).await?;
//!
//! let (events_tx, events_rx) = bridge_traits::backend_channel();
//! let session = core.open_session(Arc::new(NativePlayer::new(events_tx)), events_rx)?;
//! session.load_queue("en-2023-04-01", None).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::media::{BackendEventReceiver, MediaBackend};
use core_library::{create_pool, DatabaseConfig, DefaultMediaRepository, HttpMediaApi, MediaRepository};
use core_playback::{LibraryCatalog, MediaCatalog, PlaybackConfig, PlaybackSession, SessionBuilder};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream};
use tokio::sync::broadcast;
use tracing::info;

/// Primary façade exposed to host applications.
///
/// Owns the media store, the shared event bus and the catalog every
/// playback session resolves media through.
#[derive(Clone)]
pub struct MediaCore {
    config: CoreConfig,
    playback: PlaybackConfig,
    repository: Arc<DefaultMediaRepository>,
    catalog: Arc<dyn MediaCatalog>,
    events: EventBus,
}

impl MediaCore {
    /// Open the store and build the library stack.
    pub async fn new(config: CoreConfig, playback: PlaybackConfig) -> Result<Self> {
        playback.validate()?;

        let database = if config.is_in_memory_database() {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(&config.database_path)
        };
        let pool = create_pool(database).await?;

        let events = EventBus::new(config.event_buffer_size);
        let api = HttpMediaApi::new(config.http_client.clone(), config.api_base_url.clone());
        let repository = Arc::new(
            DefaultMediaRepository::from_pool(pool, Arc::new(api))
                .with_event_bus(events.clone())
                .with_refresh_on_read(config.features.refresh_on_read),
        );
        let catalog = Arc::new(LibraryCatalog::new(repository.clone()));

        info!(
            database = %config.database_path.display(),
            api = %config.api_base_url,
            "Media core initialized"
        );

        Ok(Self {
            config,
            playback,
            repository,
            catalog,
            events,
        })
    }

    /// Spawn a playback session driving `backend`.
    ///
    /// `backend_events` must be the receiving end of the channel the backend
    /// publishes on. Must be called from within a Tokio runtime.
    pub fn open_session(
        &self,
        backend: Arc<dyn MediaBackend>,
        backend_events: BackendEventReceiver,
    ) -> Result<PlaybackSession> {
        let mut builder = SessionBuilder::new(
            backend,
            backend_events,
            self.catalog.clone(),
            self.config.focus_broker.clone(),
        )
        .with_config(self.playback.clone());

        if self.config.features.playback_events {
            builder = builder.with_event_bus(self.events.clone());
        }
        Ok(builder.spawn()?)
    }

    pub fn repository(&self) -> Arc<dyn MediaRepository> {
        self.repository.clone()
    }

    /// Force a refresh of a lesson's audio, bypassing the read path.
    pub async fn refresh_lesson(&self, lesson_index: &str) -> Result<usize> {
        let audio = self.repository.refresh_audio(lesson_index).await?;
        Ok(audio.map_or(0, |files| files.len()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Event stream that can be filtered by the caller.
    pub fn event_stream(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn playback_config(&self) -> &PlaybackConfig {
        &self.playback
    }
}
