//! Integration tests for the playback session actor.
//!
//! The fake backend answers transport commands with the events a real
//! engine would publish, so the tests drive the session the same way a host
//! would.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::focus::{
    AudioFocusBroker, FocusChange, FocusGrant, FocusHolderId, FocusListener, FocusRequest,
};
use bridge_traits::media::{
    backend_channel, BackendEvent, BackendEventSender, MediaBackend, MediaClock,
};
use core_playback::{
    MediaCatalog, MediaItem, PlaybackConfig, PlaybackError, PlaybackSession, PlaybackSpeed,
    PlaybackState, PlaybackStatus, RepeatMode, Result, SessionBuilder,
};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const MEDIA_DURATION: Duration = Duration::from_secs(100);

// ============================================================================
// Fakes
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    SetSource(String),
    Prepare,
    Play,
    Pause,
    Stop,
    SeekTo(Duration),
    SetSpeed(f32),
    SetVolume(f32),
    Release,
}

struct FakeBackend {
    events: BackendEventSender,
    calls: Mutex<Vec<Call>>,
    clock: Mutex<MediaClock>,
    auto_prepare: bool,
}

impl FakeBackend {
    fn new(events: BackendEventSender) -> Self {
        Self {
            events,
            calls: Mutex::new(Vec::new()),
            clock: Mutex::new(MediaClock::default()),
            auto_prepare: true,
        }
    }

    fn manual_prepare(mut self) -> Self {
        self.auto_prepare = false;
        self
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn emit(&self, event: BackendEvent) {
        let _ = self.events.send(event);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn count(&self, call: &Call) -> usize {
        self.calls.lock().iter().filter(|c| *c == call).count()
    }

    fn set_sources(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::SetSource(_)))
            .count()
    }

    fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn set_source(&self, uri: &str) -> BridgeResult<()> {
        self.record(Call::SetSource(uri.to_string()));
        *self.clock.lock() = MediaClock::new(Some(MEDIA_DURATION), Duration::ZERO, Duration::ZERO);
        Ok(())
    }

    async fn prepare(&self) -> BridgeResult<()> {
        self.record(Call::Prepare);
        if self.auto_prepare {
            self.emit(BackendEvent::Prepared);
            self.emit(BackendEvent::Ready);
        }
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.record(Call::Play);
        self.emit(BackendEvent::is_playing_changed(true));
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.record(Call::Pause);
        self.emit(BackendEvent::is_playing_changed(false));
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.record(Call::Stop);
        self.clock.lock().position = Duration::ZERO;
        Ok(())
    }

    async fn seek_to(&self, position: Duration) -> BridgeResult<()> {
        self.record(Call::SeekTo(position));
        let mut clock = self.clock.lock();
        clock.position = position;
        clock.buffered = position;
        Ok(())
    }

    async fn set_speed(&self, multiplier: f32) -> BridgeResult<()> {
        self.record(Call::SetSpeed(multiplier));
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
        self.record(Call::SetVolume(volume));
        Ok(())
    }

    async fn clock(&self) -> BridgeResult<MediaClock> {
        Ok(*self.clock.lock())
    }

    async fn release(&self) -> BridgeResult<()> {
        self.record(Call::Release);
        Ok(())
    }
}

struct FakeFocusBroker {
    grant: Mutex<FocusGrant>,
    listeners: Mutex<HashMap<FocusHolderId, FocusListener>>,
    requests: Mutex<u32>,
    abandons: Mutex<u32>,
}

impl FakeFocusBroker {
    fn new(grant: FocusGrant) -> Self {
        Self {
            grant: Mutex::new(grant),
            listeners: Mutex::new(HashMap::new()),
            requests: Mutex::new(0),
            abandons: Mutex::new(0),
        }
    }

    fn notify(&self, change: FocusChange) {
        for listener in self.listeners.lock().values() {
            let _ = listener.send(change);
        }
    }

    fn requests(&self) -> u32 {
        *self.requests.lock()
    }

    fn abandons(&self) -> u32 {
        *self.abandons.lock()
    }
}

#[async_trait]
impl AudioFocusBroker for FakeFocusBroker {
    async fn request(&self, request: FocusRequest) -> BridgeResult<FocusGrant> {
        *self.requests.lock() += 1;
        let grant = *self.grant.lock();
        if grant.is_granted() {
            self.listeners
                .lock()
                .insert(request.holder, request.listener);
        }
        Ok(grant)
    }

    async fn abandon(&self, holder: FocusHolderId) -> BridgeResult<()> {
        *self.abandons.lock() += 1;
        self.listeners.lock().remove(&holder);
        Ok(())
    }
}

struct FakeCatalog {
    items: Vec<MediaItem>,
    recorded: Mutex<Vec<(String, Duration)>>,
}

impl FakeCatalog {
    fn lesson() -> Self {
        let items = ["a1", "a2", "a3"]
            .into_iter()
            .map(|id| {
                MediaItem::new(id, format!("https://cdn.example/{id}.mp3"))
                    .with_title(format!("Track {id}"))
            })
            .collect();
        Self {
            items,
            recorded: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl MediaCatalog for FakeCatalog {
    async fn find_media_item(&self, id: &str) -> Result<Option<MediaItem>> {
        Ok(self.items.iter().find(|item| item.id == id).cloned())
    }

    async fn queue_items(&self, scope_id: &str) -> Result<Vec<MediaItem>> {
        Ok(if scope_id == "lesson" {
            self.items.clone()
        } else {
            Vec::new()
        })
    }

    async fn record_duration(&self, id: &str, duration: Duration) -> Result<()> {
        self.recorded.lock().push((id.to_string(), duration));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    session: PlaybackSession,
    backend: Arc<FakeBackend>,
    broker: Arc<FakeFocusBroker>,
    catalog: Arc<FakeCatalog>,
    bus: EventBus,
}

fn harness() -> Harness {
    harness_with(FocusGrant::Granted, false)
}

fn harness_with(grant: FocusGrant, manual_prepare: bool) -> Harness {
    let (events_tx, events_rx) = backend_channel();
    let mut backend = FakeBackend::new(events_tx);
    if manual_prepare {
        backend = backend.manual_prepare();
    }
    let backend = Arc::new(backend);
    let broker = Arc::new(FakeFocusBroker::new(grant));
    let catalog = Arc::new(FakeCatalog::lesson());
    let bus = EventBus::new(64);

    let session = SessionBuilder::new(backend.clone(), events_rx, catalog.clone(), broker.clone())
        .with_config(PlaybackConfig::default())
        .with_event_bus(bus.clone())
        .spawn()
        .unwrap();

    Harness {
        session,
        backend,
        broker,
        catalog,
        bus,
    }
}

async fn wait_until(
    session: &PlaybackSession,
    predicate: impl FnMut(&PlaybackState) -> bool,
) -> PlaybackState {
    let mut states = session.subscribe_state();
    let state = tokio::time::timeout(Duration::from_secs(5), states.wait_for(predicate))
        .await
        .expect("state not reached in time")
        .expect("session state channel closed");
    state.clone()
}

async fn wait_for_status(session: &PlaybackSession, status: PlaybackStatus) -> PlaybackState {
    wait_until(session, |state| state.status == status).await
}

async fn playing(h: &Harness, id: &str) -> PlaybackState {
    h.session.play(id).await.unwrap();
    wait_until(&h.session, |state| {
        state.status == PlaybackStatus::Playing && state.media_id.as_deref() == Some(id)
    })
    .await
}

/// Give the actor a chance to drain queued events.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ============================================================================
// Starting playback
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_play_reaches_playing_with_focus() {
    let h = harness();

    let state = playing(&h, "a1").await;
    assert!(state.is_playing);
    assert_eq!(state.title.as_deref(), Some("Track a1"));
    assert_eq!(state.duration, Some(MEDIA_DURATION));
    assert_eq!(state.current_index, Some(0));

    assert_eq!(
        &h.backend.calls()[..3],
        [
            Call::SetSource("https://cdn.example/a1.mp3".to_string()),
            Call::Prepare,
            Call::Play
        ]
    );
    assert_eq!(h.broker.requests(), 1);
    assert_eq!(
        *h.catalog.recorded.lock(),
        vec![("a1".to_string(), MEDIA_DURATION)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_enters_error_without_touching_backend() {
    let h = harness();

    let result = h.session.play("missing").await;
    assert!(matches!(result, Err(PlaybackError::NotFound(id)) if id == "missing"));

    let state = h.session.state();
    assert_eq!(state.status, PlaybackStatus::Error);
    assert!(state.error.is_some());
    assert_eq!(h.backend.set_sources(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_id_while_buffering_drops_pending_source() {
    let h = harness_with(FocusGrant::Granted, true);

    h.session.play("a1").await.unwrap();
    assert_eq!(h.session.state().status, PlaybackStatus::Buffering);

    let result = h.session.play("missing").await;
    assert!(matches!(result, Err(PlaybackError::NotFound(_))));
    assert_eq!(h.session.state().status, PlaybackStatus::Error);

    // The engine finishes preparing the source that was replaced.
    h.backend.emit(BackendEvent::Prepared);
    h.backend.emit(BackendEvent::Ready);
    settle().await;

    let state = h.session.state();
    assert_eq!(state.status, PlaybackStatus::Error);
    assert!(!state.is_playing);
    assert_eq!(state.media_id.as_deref(), Some("missing"));
    assert_eq!(h.backend.count(&Call::Stop), 1);
    assert_eq!(h.backend.count(&Call::Play), 0);
    assert_eq!(h.broker.abandons(), 1);
    assert!(h.catalog.recorded.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_focus_denied_never_starts_playback() {
    let h = harness_with(FocusGrant::Denied, false);

    let result = h.session.play("a1").await;
    assert!(matches!(result, Err(PlaybackError::FocusDenied)));
    settle().await;

    let state = h.session.state();
    assert_ne!(state.status, PlaybackStatus::Playing);
    assert!(!state.is_playing);
    assert_eq!(state.error, None);
    assert_eq!(h.backend.count(&Call::Prepare), 0);
    assert_eq!(h.backend.count(&Call::Play), 0);
}

#[tokio::test(start_paused = true)]
async fn test_backend_playing_without_focus_is_paused() {
    let h = harness();
    playing(&h, "a1").await;

    h.broker.notify(FocusChange::Loss);
    wait_for_status(&h.session, PlaybackStatus::Paused).await;

    // The engine starts on its own, e.g. from a hardware media button.
    h.backend.emit(BackendEvent::is_playing_changed(true));
    settle().await;

    let state = h.session.state();
    assert_eq!(state.status, PlaybackStatus::Paused);
    assert!(!state.is_playing);
    assert_eq!(h.backend.count(&Call::Pause), 2);
}

// ============================================================================
// Transport
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_seek_clamps_to_duration() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.seek(Duration::from_secs(500)).await.unwrap();
    assert_eq!(h.backend.last(), Some(Call::SeekTo(MEDIA_DURATION)));
    assert_eq!(h.session.state().position, MEDIA_DURATION);
}

#[tokio::test(start_paused = true)]
async fn test_fast_forward_stops_at_end() {
    let h = harness();
    playing(&h, "a1").await;
    h.session.seek(Duration::from_secs(95)).await.unwrap();

    h.session.fast_forward().await.unwrap();
    assert_eq!(h.backend.last(), Some(Call::SeekTo(Duration::from_secs(100))));
}

#[tokio::test(start_paused = true)]
async fn test_rewind_stops_at_start() {
    let h = harness();
    playing(&h, "a1").await;
    h.session.seek(Duration::from_secs(4)).await.unwrap();

    h.session.rewind().await.unwrap();
    assert_eq!(h.backend.last(), Some(Call::SeekTo(Duration::ZERO)));
    assert_eq!(h.session.state().position, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_seek_before_prepared_is_applied_once_prepared() {
    let h = harness_with(FocusGrant::Granted, true);

    h.session.play("a1").await.unwrap();
    h.session.seek(Duration::from_secs(30)).await.unwrap();
    assert_eq!(h.backend.count(&Call::SeekTo(Duration::from_secs(30))), 0);
    assert_eq!(h.session.state().position, Duration::from_secs(30));

    h.backend.emit(BackendEvent::Prepared);
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert_eq!(h.backend.count(&Call::SeekTo(Duration::from_secs(30))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pause_is_idempotent() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.pause().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Paused).await;
    settle().await;

    let mut states = h.session.subscribe_state();
    states.borrow_and_update();

    h.session.pause().await.unwrap();
    settle().await;

    assert_eq!(h.backend.count(&Call::Pause), 1);
    assert!(!states.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_play_pause_toggles() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.play_pause().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Paused).await;

    h.session.play_pause().await.unwrap();
    let state = wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert!(state.is_playing);
    assert_eq!(h.backend.set_sources(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_host_pause_pauses_playback() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.on_host_pause().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Paused).await;

    // Only a session left in Ready is resumed by the host.
    h.session.on_host_resume().await.unwrap();
    settle().await;
    assert_eq!(h.session.state().status, PlaybackStatus::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_user_stop_is_idle_and_abandons_focus() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.stop(true).await.unwrap();
    let state = h.session.state();
    assert_eq!(state.status, PlaybackStatus::Idle);
    assert_eq!(state.position, Duration::ZERO);
    assert_eq!(h.backend.count(&Call::Stop), 1);
    assert_eq!(h.broker.abandons(), 1);

    // Resuming re-prepares the same item.
    h.session.resume().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert_eq!(h.backend.set_sources(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_system_stop_is_not_resumable() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.stop(false).await.unwrap();
    assert_eq!(h.session.state().status, PlaybackStatus::Stopped);

    h.session.resume().await.unwrap();
    settle().await;
    assert_eq!(h.session.state().status, PlaybackStatus::Stopped);
    assert_eq!(h.backend.count(&Call::Prepare), 1);
}

#[tokio::test(start_paused = true)]
async fn test_backend_error_then_retry() {
    let h = harness();
    playing(&h, "a1").await;

    h.backend.emit(BackendEvent::error("decoder crashed"));
    let state = wait_for_status(&h.session, PlaybackStatus::Error).await;
    assert!(!state.is_playing);
    assert_eq!(state.position, Duration::ZERO);
    assert!(state.error.unwrap().contains("decoder crashed"));

    h.session.resume().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert_eq!(h.backend.set_sources(), 2);
}

// ============================================================================
// Focus
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_transient_focus_loss_resumes_on_gain() {
    let h = harness();
    playing(&h, "a1").await;

    h.broker.notify(FocusChange::LossTransient);
    wait_for_status(&h.session, PlaybackStatus::Paused).await;

    h.broker.notify(FocusChange::Gain);
    let state = wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert_eq!(state.media_id.as_deref(), Some("a1"));
    assert_eq!(h.backend.set_sources(), 1);
    assert_eq!(h.backend.count(&Call::Play), 2);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_focus_loss_does_not_resume() {
    let h = harness();
    playing(&h, "a1").await;

    h.broker.notify(FocusChange::Loss);
    wait_for_status(&h.session, PlaybackStatus::Paused).await;

    h.broker.notify(FocusChange::Gain);
    settle().await;
    assert_eq!(h.session.state().status, PlaybackStatus::Paused);
    assert_eq!(h.backend.count(&Call::Play), 1);
}

#[tokio::test(start_paused = true)]
async fn test_user_pause_cancels_resume_on_gain() {
    let h = harness();
    playing(&h, "a1").await;

    h.broker.notify(FocusChange::LossTransient);
    wait_for_status(&h.session, PlaybackStatus::Paused).await;
    h.session.pause().await.unwrap();

    h.broker.notify(FocusChange::Gain);
    settle().await;
    assert_eq!(h.session.state().status, PlaybackStatus::Paused);
}

#[tokio::test(start_paused = true)]
async fn test_duckable_loss_lowers_volume() {
    let h = harness();
    playing(&h, "a1").await;

    h.broker.notify(FocusChange::LossTransientCanDuck);
    settle().await;
    assert_eq!(h.backend.last(), Some(Call::SetVolume(0.2)));
    assert_eq!(h.session.state().status, PlaybackStatus::Playing);

    h.broker.notify(FocusChange::Gain);
    settle().await;
    assert_eq!(h.backend.last(), Some(Call::SetVolume(1.0)));
}

// ============================================================================
// Queue
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_moves_through_queue_without_wrapping() {
    let h = harness();
    h.session.load_queue("lesson", Some("a1")).await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;

    h.session.skip_to_next().await.unwrap();
    let state = wait_until(&h.session, |s| {
        s.media_id.as_deref() == Some("a2") && s.status == PlaybackStatus::Playing
    })
    .await;
    assert!(state.has_previous);
    assert!(state.has_next);

    h.session.skip_to_previous().await.unwrap();
    wait_until(&h.session, |s| s.media_id.as_deref() == Some("a1")).await;

    h.session.skip_to_previous().await.unwrap();
    settle().await;
    let state = h.session.state();
    assert_eq!(state.media_id.as_deref(), Some("a1"));
    assert_eq!(state.current_index, Some(0));
    assert!(!state.has_previous);
}

#[tokio::test(start_paused = true)]
async fn test_completion_advances_queue() {
    let h = harness();
    h.session.load_queue("lesson", Some("a1")).await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;

    h.backend.emit(BackendEvent::Completion);
    let state = wait_until(&h.session, |s| {
        s.media_id.as_deref() == Some("a2") && s.status == PlaybackStatus::Playing
    })
    .await;
    assert_eq!(state.current_index, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_completion_of_last_item_ends_and_replays_from_start() {
    let h = harness();
    h.session.load_queue("lesson", Some("a3")).await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    h.session.seek(Duration::from_secs(99)).await.unwrap();

    h.backend.emit(BackendEvent::is_playing_changed(false));
    h.backend.emit(BackendEvent::Completion);
    let state = wait_for_status(&h.session, PlaybackStatus::Ended).await;
    assert_eq!(state.position, Duration::ZERO);
    assert!(!state.is_playing);

    h.session.play_pause().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    assert_eq!(h.backend.last(), Some(Call::Play));
    assert_eq!(h.backend.count(&Call::SeekTo(Duration::ZERO)), 1);
    assert_eq!(h.backend.set_sources(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_one_replays_current_item() {
    let h = harness();
    h.session.load_queue("lesson", Some("a1")).await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    h.session.set_repeat_mode(RepeatMode::One).await.unwrap();

    h.backend.emit(BackendEvent::Completion);
    settle().await;

    let state = h.session.state();
    assert_eq!(state.media_id.as_deref(), Some("a1"));
    assert_eq!(state.repeat_mode, RepeatMode::One);
    assert_eq!(h.backend.count(&Call::SeekTo(Duration::ZERO)), 1);
    assert_eq!(h.backend.count(&Call::Play), 2);
    assert_eq!(h.backend.set_sources(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_all_wraps_to_first_item() {
    let h = harness();
    h.session.load_queue("lesson", Some("a3")).await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Playing).await;
    h.session.set_repeat_mode(RepeatMode::All).await.unwrap();

    h.backend.emit(BackendEvent::Completion);
    let state = wait_until(&h.session, |s| {
        s.media_id.as_deref() == Some("a1") && s.status == PlaybackStatus::Playing
    })
    .await;
    assert_eq!(state.current_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_queue_scope_is_empty() {
    let h = harness();

    h.session.load_queue("nowhere", None).await.unwrap();
    let state = h.session.state();
    assert_eq!(state.current_index, None);
    assert_eq!(state.status, PlaybackStatus::Idle);
}

// ============================================================================
// Speed and progress
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_progress_ticks_once_per_interval() {
    let h = harness();
    playing(&h, "a1").await;

    let mut progress = h.session.subscribe_progress();
    progress.borrow_and_update();

    let start = Instant::now();
    progress.changed().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(1));

    let snapshot = *progress.borrow_and_update();
    assert_eq!(snapshot.duration, MEDIA_DURATION);
    assert_eq!(snapshot.elapsed, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_speed_cycles_and_halves_tick_period() {
    let h = harness();
    playing(&h, "a1").await;

    for expected in [PlaybackSpeed::Fast, PlaybackSpeed::Fastest] {
        h.session.toggle_speed().await.unwrap();
        assert_eq!(h.session.speed(), expected);
    }
    assert_eq!(h.backend.last(), Some(Call::SetSpeed(2.0)));

    let mut progress = h.session.subscribe_progress();
    progress.borrow_and_update();

    let start = Instant::now();
    progress.changed().await.unwrap();
    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert_eq!(progress.borrow().elapsed, Duration::from_secs(1));

    h.session.toggle_speed().await.unwrap();
    h.session.toggle_speed().await.unwrap();
    assert_eq!(h.session.speed(), PlaybackSpeed::Normal);
}

#[tokio::test(start_paused = true)]
async fn test_no_progress_while_paused() {
    let h = harness();
    playing(&h, "a1").await;
    h.session.pause().await.unwrap();
    wait_for_status(&h.session, PlaybackStatus::Paused).await;
    settle().await;

    let mut progress = h.session.subscribe_progress();
    progress.borrow_and_update();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!progress.has_changed().unwrap());
}

// ============================================================================
// Events and lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_lifecycle_events_are_published() {
    let h = harness();
    let mut events = h.bus.subscribe();

    playing(&h, "a1").await;
    h.session.pause().await.unwrap();
    h.session.stop(true).await.unwrap();

    let mut received = Vec::new();
    while let Ok(CoreEvent::Playback(event)) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(
        &received[0],
        PlaybackEvent::Started { media_id, .. } if media_id == "a1"
    ));
    assert!(received
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Paused { .. })));
    assert!(matches!(
        received.last(),
        Some(PlaybackEvent::Stopped { by_user: true, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_release_releases_backend_once() {
    let h = harness();
    playing(&h, "a1").await;

    h.session.release().await;
    h.session.release().await;

    assert_eq!(h.backend.count(&Call::Release), 1);
    assert_eq!(h.backend.last(), Some(Call::Release));
    assert_eq!(h.broker.abandons(), 1);
    assert!(matches!(
        h.session.play("a2").await,
        Err(PlaybackError::SessionClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_session_releases_backend() {
    let h = harness();
    let backend = h.backend.clone();
    playing(&h, "a1").await;

    drop(h);
    for _ in 0..10 {
        if backend.count(&Call::Release) == 1 {
            break;
        }
        settle().await;
    }
    assert_eq!(backend.count(&Call::Release), 1);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (events_tx, events_rx) = backend_channel();
    let config = PlaybackConfig::default().with_progress_interval(Duration::ZERO);

    let result = SessionBuilder::new(
        Arc::new(FakeBackend::new(events_tx)),
        events_rx,
        Arc::new(FakeCatalog::lesson()),
        Arc::new(FakeFocusBroker::new(FocusGrant::Granted)),
    )
    .with_config(config)
    .spawn();

    assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
}
