//! # Playback Session Example
//!
//! Drives a playback session against a simulated media engine: load a
//! queue, watch progress, change speed, seek, pause and skip.
//!
//! Run with: `cargo run --example session_demo --package core-playback`

use anyhow::Result;
use async_trait::async_trait;
use bridge_desktop::InProcessFocusBroker;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::media::{
    backend_channel, BackendEvent, BackendEventSender, MediaBackend, MediaClock,
};
use core_playback::{MediaCatalog, MediaItem, SessionBuilder};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const TRACK_LENGTH: Duration = Duration::from_secs(30);

// ============================================================================
// Simulated Engine
// ============================================================================

#[derive(Default)]
struct Transport {
    position: Duration,
    playing_since: Option<Instant>,
    speed: f32,
}

impl Transport {
    fn position(&self) -> Duration {
        let played = self
            .playing_since
            .map(|since| since.elapsed().mul_f32(self.speed))
            .unwrap_or_default();
        (self.position + played).min(TRACK_LENGTH)
    }
}

/// Engine that renders nothing but keeps time like a real one.
struct SimulatedPlayer {
    events: BackendEventSender,
    transport: Mutex<Transport>,
}

impl SimulatedPlayer {
    fn new(events: BackendEventSender) -> Self {
        Self {
            events,
            transport: Mutex::new(Transport {
                speed: 1.0,
                ..Default::default()
            }),
        }
    }

    fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl MediaBackend for SimulatedPlayer {
    async fn set_source(&self, uri: &str) -> BridgeResult<()> {
        println!("  [engine] source {uri}");
        let mut transport = self.transport.lock();
        transport.position = Duration::ZERO;
        transport.playing_since = None;
        Ok(())
    }

    async fn prepare(&self) -> BridgeResult<()> {
        self.emit(BackendEvent::Prepared);
        self.emit(BackendEvent::Ready);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.transport.lock().playing_since = Some(Instant::now());
        self.emit(BackendEvent::is_playing_changed(true));
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        let mut transport = self.transport.lock();
        transport.position = transport.position();
        transport.playing_since = None;
        self.emit(BackendEvent::is_playing_changed(false));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        *self.transport.lock() = Transport {
            speed: 1.0,
            ..Default::default()
        };
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> BridgeResult<()> {
        let mut transport = self.transport.lock();
        transport.position = position;
        if transport.playing_since.is_some() {
            transport.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    async fn set_speed(&self, multiplier: f32) -> BridgeResult<()> {
        let mut transport = self.transport.lock();
        transport.position = transport.position();
        if transport.playing_since.is_some() {
            transport.playing_since = Some(Instant::now());
        }
        transport.speed = multiplier;
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        println!("  [engine] volume {volume}");
        Ok(())
    }

    async fn clock(&self) -> BridgeResult<MediaClock> {
        let position = self.transport.lock().position();
        Ok(MediaClock::new(Some(TRACK_LENGTH), position, TRACK_LENGTH))
    }

    async fn release(&self) -> BridgeResult<()> {
        println!("  [engine] released");
        Ok(())
    }
}

// ============================================================================
// Catalog
// ============================================================================

struct StaticCatalog(Vec<MediaItem>);

#[async_trait]
impl MediaCatalog for StaticCatalog {
    async fn find_media_item(&self, id: &str) -> core_playback::Result<Option<MediaItem>> {
        Ok(self.0.iter().find(|item| item.id == id).cloned())
    }

    async fn queue_items(&self, _scope_id: &str) -> core_playback::Result<Vec<MediaItem>> {
        Ok(self.0.clone())
    }

    async fn record_duration(&self, id: &str, duration: Duration) -> core_playback::Result<()> {
        println!("  [catalog] {id} is {}s long", duration.as_secs());
        Ok(())
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(LoggingConfig::default().with_format(LogFormat::Compact))?;

    let catalog = StaticCatalog(vec![
        MediaItem::new("intro", "file:///lessons/intro.mp3").with_title("Introduction"),
        MediaItem::new("study", "file:///lessons/study.mp3").with_title("Bible Study"),
    ]);

    let (events_tx, events_rx) = backend_channel();
    let session = SessionBuilder::new(
        Arc::new(SimulatedPlayer::new(events_tx)),
        events_rx,
        Arc::new(catalog),
        Arc::new(InProcessFocusBroker::new()),
    )
    .spawn()?;

    println!("Loading queue");
    session.load_queue("demo", Some("intro")).await?;

    let mut progress = session.subscribe_progress();
    let watcher = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            println!(
                "  [progress] {:>5.1}s / {}s ({:.0}%)",
                snapshot.current_position().as_secs_f32(),
                snapshot.duration.as_secs(),
                snapshot.fraction() * 100.0
            );
        }
    });

    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("Toggling speed");
    session.toggle_speed().await?;
    println!("Speed is now {:?}", session.speed());
    tokio::time::sleep(Duration::from_secs(2)).await;

    println!("Fast forward");
    session.fast_forward().await?;
    tokio::time::sleep(Duration::from_secs(1)).await;

    println!("Pausing");
    session.pause().await?;
    println!("State: {:?}", session.state().status);

    println!("Next item");
    session.skip_to_next().await?;
    tokio::time::sleep(Duration::from_secs(2)).await;

    session.release().await;
    watcher.abort();
    Ok(())
}
