//! # Playback Session
//!
//! The state machine coordinating one playback instance.
//!
//! ## Overview
//!
//! A session is an actor: [`PlaybackSession`] is a cheap handle that sends
//! commands to a task owning the backend, the queue, the focus arbiter and
//! the progress ticker. The task consumes, one message at a time:
//!
//! - commands from the handle, each acknowledged once its transition is applied
//! - [`BackendEvent`]s, in arrival order
//! - focus changes from the broker
//!
//! State is published through `watch` channels and is only ever written by
//! the task, so observers see a single consistent sequence of snapshots.
//!
//! ```text
//! Idle ─play─▶ Buffering ─Prepared/Ready─▶ Ready ─▶ Playing ⇄ Paused ─▶ Ended
//!   ▲                                                   │
//!   └──────────────── stop(by_user) ◀───────────────────┘    Error from anywhere
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let (events_tx, events_rx) = bridge_traits::backend_channel();
//! let backend = Arc::new(NativePlayer::new(events_tx));
//!
//! let session = SessionBuilder::new(backend, events_rx, catalog, focus_broker)
//!     .with_event_bus(bus)
//!     .spawn()?;
//!
//! session.load_queue("en-2023-04-01", Some("a1")).await?;
//! let mut state = session.subscribe_state();
//! while state.changed().await.is_ok() {
//!     render(&state.borrow());
//! }
//! session.release().await;
//! ```
//!
//! ## Cancellation
//!
//! [`PlaybackSession::release`] cancels the task wherever it is suspended.
//! The in-flight command resolves with [`PlaybackError::SessionClosed`], no
//! further backend command is issued, focus is abandoned and the backend is
//! released exactly once. Dropping every handle has the same effect once
//! queued commands have drained.

use crate::catalog::{MediaCatalog, MediaItem};
use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::focus::{FocusAction, FocusArbiter, FocusChangeReceiver};
use crate::queue::QueueManager;
use crate::speed::PlaybackSpeed;
use crate::state::{PlaybackProgressState, PlaybackState, PlaybackStatus, RepeatMode};
use crate::ticker::ProgressTicker;
use bridge_traits::focus::{AudioFocusBroker, FocusChange, FocusHolderId};
use bridge_traits::media::{BackendEvent, BackendEventReceiver, MediaBackend};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

const FULL_VOLUME: f32 = 1.0;

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug)]
enum Command {
    Play(String),
    PlayItem(MediaItem),
    Resume,
    Pause,
    PlayPause,
    Seek(Duration),
    FastForward,
    Rewind,
    Stop { by_user: bool },
    LoadQueue { scope_id: String, start_id: Option<String> },
    SkipToNext,
    SkipToPrevious,
    SetRepeatMode(RepeatMode),
    SetSpeed(PlaybackSpeed),
    ToggleSpeed,
    HostPause,
    HostResume,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Play(_) => "play",
            Command::PlayItem(_) => "play_item",
            Command::Resume => "resume",
            Command::Pause => "pause",
            Command::PlayPause => "play_pause",
            Command::Seek(_) => "seek",
            Command::FastForward => "fast_forward",
            Command::Rewind => "rewind",
            Command::Stop { .. } => "stop",
            Command::LoadQueue { .. } => "load_queue",
            Command::SkipToNext => "skip_to_next",
            Command::SkipToPrevious => "skip_to_previous",
            Command::SetRepeatMode(_) => "set_repeat_mode",
            Command::SetSpeed(_) => "set_speed",
            Command::ToggleSpeed => "toggle_speed",
            Command::HostPause => "host_pause",
            Command::HostResume => "host_resume",
        }
    }
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<Result<()>>,
}

// ============================================================================
// Builder
// ============================================================================

/// Collaborators and settings for a new session.
pub struct SessionBuilder {
    backend: Arc<dyn MediaBackend>,
    backend_events: BackendEventReceiver,
    catalog: Arc<dyn MediaCatalog>,
    focus_broker: Arc<dyn AudioFocusBroker>,
    config: PlaybackConfig,
    events: Option<EventBus>,
}

impl SessionBuilder {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        backend_events: BackendEventReceiver,
        catalog: Arc<dyn MediaCatalog>,
        focus_broker: Arc<dyn AudioFocusBroker>,
    ) -> Self {
        Self {
            backend,
            backend_events,
            catalog,
            focus_broker,
            config: PlaybackConfig::default(),
            events: None,
        }
    }

    pub fn with_config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    /// Publish [`PlaybackEvent`]s on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Validate the configuration and start the session task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> Result<PlaybackSession> {
        self.config.validate()?;

        let (commands_tx, commands_rx) = mpsc::channel(self.config.command_buffer);
        let (state_tx, state_rx) = watch::channel(PlaybackState::default());
        let (progress_tx, progress_rx) = watch::channel(PlaybackProgressState::default());
        let (speed_tx, speed_rx) = watch::channel(self.config.initial_speed);

        let (focus, focus_changes) = FocusArbiter::new(self.focus_broker, &self.config);
        let holder = focus.holder();
        let ticker = ProgressTicker::new(
            self.config.progress_interval,
            self.backend.clone(),
            progress_tx,
        );

        let actor = SessionActor {
            config: self.config,
            backend: self.backend,
            catalog: self.catalog,
            focus,
            queue: QueueManager::new(),
            ticker,
            state: state_tx,
            speed: speed_tx,
            events: self.events,
            current: None,
            initialized: false,
            pause_requested: false,
            resume_position: Duration::ZERO,
            announced: false,
        };

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(
            actor
                .run(
                    commands_rx,
                    self.backend_events,
                    focus_changes,
                    shutdown.clone(),
                )
                .instrument(info_span!("playback_session", holder = %holder)),
        );

        info!(holder = %holder, "Playback session started");

        Ok(PlaybackSession {
            commands: commands_tx,
            state: state_rx,
            progress: progress_rx,
            speed: speed_rx,
            holder,
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running playback session.
pub struct PlaybackSession {
    commands: mpsc::Sender<Envelope>,
    state: watch::Receiver<PlaybackState>,
    progress: watch::Receiver<PlaybackProgressState>,
    speed: watch::Receiver<PlaybackSpeed>,
    holder: FocusHolderId,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackSession {
    async fn send(&self, command: Command) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)?
    }

    /// Resolve `id` through the catalog and start it from the beginning.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the catalog has no such item (the session enters `Error`)
    /// - `FocusDenied` if focus was refused (playback does not start)
    /// - `BackendFailure` if the backend rejected a command
    pub async fn play(&self, id: impl Into<String>) -> Result<()> {
        self.send(Command::Play(id.into())).await
    }

    /// Start an already resolved item, e.g. a video clip.
    pub async fn play_item(&self, item: MediaItem) -> Result<()> {
        self.send(Command::PlayItem(item)).await
    }

    /// Resume the prepared item, or re-prepare the current queue item at the
    /// last known position.
    pub async fn resume(&self) -> Result<()> {
        self.send(Command::Resume).await
    }

    /// Pause when playing or buffering; otherwise a no-op.
    pub async fn pause(&self) -> Result<()> {
        self.send(Command::Pause).await
    }

    /// Pause when playing, resume otherwise. From `Ended` the item restarts.
    pub async fn play_pause(&self) -> Result<()> {
        self.send(Command::PlayPause).await
    }

    /// Move to `position`, clamped to the item's duration.
    pub async fn seek(&self, position: Duration) -> Result<()> {
        self.send(Command::Seek(position)).await
    }

    pub async fn fast_forward(&self) -> Result<()> {
        self.send(Command::FastForward).await
    }

    pub async fn rewind(&self) -> Result<()> {
        self.send(Command::Rewind).await
    }

    /// Stop and drop the prepared source. A user stop leaves the session
    /// `Idle`; any other stop leaves it `Stopped`.
    pub async fn stop(&self, by_user: bool) -> Result<()> {
        self.send(Command::Stop { by_user }).await
    }

    /// Fill the queue with the items of `scope_id` and optionally start one.
    pub async fn load_queue(
        &self,
        scope_id: impl Into<String>,
        start_id: Option<&str>,
    ) -> Result<()> {
        self.send(Command::LoadQueue {
            scope_id: scope_id.into(),
            start_id: start_id.map(str::to_string),
        })
        .await
    }

    /// Play the next queue item; a no-op at the end of the queue.
    pub async fn skip_to_next(&self) -> Result<()> {
        self.send(Command::SkipToNext).await
    }

    /// Play the previous queue item; a no-op at the start of the queue.
    pub async fn skip_to_previous(&self) -> Result<()> {
        self.send(Command::SkipToPrevious).await
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) -> Result<()> {
        self.send(Command::SetRepeatMode(mode)).await
    }

    pub async fn set_speed(&self, speed: PlaybackSpeed) -> Result<()> {
        self.send(Command::SetSpeed(speed)).await
    }

    /// Cycle to the next speed step.
    pub async fn toggle_speed(&self) -> Result<()> {
        self.send(Command::ToggleSpeed).await
    }

    /// The host UI went to the background.
    pub async fn on_host_pause(&self) -> Result<()> {
        self.send(Command::HostPause).await
    }

    /// The host UI came back to the foreground.
    pub async fn on_host_resume(&self) -> Result<()> {
        self.send(Command::HostResume).await
    }

    /// Tear the session down and wait for the backend to be released.
    ///
    /// Calling it again is a no-op.
    pub async fn release(&self) {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(holder = %self.holder, error = %e, "Playback session task failed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn progress(&self) -> PlaybackProgressState {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<PlaybackProgressState> {
        self.progress.clone()
    }

    pub fn speed(&self) -> PlaybackSpeed {
        *self.speed.borrow()
    }

    pub fn subscribe_speed(&self) -> watch::Receiver<PlaybackSpeed> {
        self.speed.clone()
    }

    /// Holder id this session uses with the focus broker.
    pub fn focus_holder(&self) -> FocusHolderId {
        self.holder
    }
}

// ============================================================================
// Actor
// ============================================================================

struct SessionActor {
    config: PlaybackConfig,
    backend: Arc<dyn MediaBackend>,
    catalog: Arc<dyn MediaCatalog>,
    focus: FocusArbiter,
    queue: QueueManager,
    ticker: ProgressTicker,
    state: watch::Sender<PlaybackState>,
    speed: watch::Sender<PlaybackSpeed>,
    events: Option<EventBus>,
    current: Option<MediaItem>,
    /// The backend has prepared the current source.
    initialized: bool,
    /// Do not start rendering on `Prepared`/`Ready`.
    pause_requested: bool,
    /// Position to seek to once the current source is prepared.
    resume_position: Duration,
    /// `Started` was emitted for the current item.
    announced: bool,
}

impl SessionActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Envelope>,
        mut backend_events: BackendEventReceiver,
        mut focus_changes: FocusChangeReceiver,
        shutdown: CancellationToken,
    ) {
        let speed = self.current_speed();
        if speed != PlaybackSpeed::Normal {
            if let Err(e) = self.backend.set_speed(speed.multiplier()).await {
                warn!(error = %e, "Failed to apply initial speed");
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(event) = backend_events.recv() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {}
                        _ = self.handle_backend_event(event) => {}
                    }
                }
                Some(change) = focus_changes.recv() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {}
                        _ = self.handle_focus_change(change) => {}
                    }
                }
                envelope = commands.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        debug!("All session handles dropped");
                        break;
                    };
                    let name = command.name();
                    let result = tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => Err(PlaybackError::SessionClosed),
                        result = self.handle_command(command) => result,
                    };
                    if let Err(e) = &result {
                        debug!(command = name, error = %e, "Command failed");
                    }
                    let _ = reply.send(result);
                }
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.ticker.cancel();
        self.focus.abandon().await;
        self.initialized = false;

        if let Err(e) = self.backend.release().await {
            warn!(error = %e, "Media backend release failed");
        }
        info!("Playback session released");
    }

    // ===== Helpers =====

    fn snapshot(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    fn current_speed(&self) -> PlaybackSpeed {
        *self.speed.borrow()
    }

    fn media_id(&self) -> Option<String> {
        self.current.as_ref().map(|item| item.id.clone())
    }

    fn emit(&self, event: PlaybackEvent) {
        if let Some(bus) = &self.events {
            let _ = bus.emit(CoreEvent::Playback(event));
        }
    }

    /// Apply `change` to the published state. Observers and the ticker are
    /// only notified when the state actually changed.
    async fn update(&mut self, change: impl FnOnce(&mut PlaybackState)) {
        let current_index = self.queue.current_index();
        let has_previous = self.queue.has_previous();
        let has_next = self.queue.has_next();

        let changed = self.state.send_if_modified(|state| {
            let before = state.clone();
            change(state);
            state.current_index = current_index;
            state.has_previous = has_previous;
            state.has_next = has_next;

            if before.status != state.status {
                debug!(from = ?before.status, to = ?state.status, "Playback status changed");
            }
            *state != before
        });

        if changed {
            let snapshot = self.snapshot();
            let speed = self.current_speed();
            self.ticker.restart(&snapshot, speed).await;
        }
    }

    /// Best known position: the backend clock once prepared, else the state.
    async fn current_position(&self) -> Duration {
        if self.initialized {
            if let Ok(clock) = self.backend.clock().await {
                return clock.position;
            }
        }
        self.state.borrow().position
    }

    /// Enter `Error` and report `error`, which is handed back to the caller.
    async fn fail(&mut self, error: PlaybackError, media_id: Option<String>) -> PlaybackError {
        self.initialized = false;
        self.pause_requested = false;
        let message = error.to_string();

        let id = media_id.clone();
        let msg = message.clone();
        self.update(move |state| {
            state.status = PlaybackStatus::Error;
            state.is_playing = false;
            state.position = Duration::ZERO;
            state.error = Some(msg);
            if id.is_some() {
                state.media_id = id;
            }
        })
        .await;

        self.emit(PlaybackEvent::Error {
            media_id,
            message,
            recoverable: error.is_transient(),
        });
        error
    }

    // ===== Commands =====

    async fn handle_command(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Play(id) => self.play(&id).await,
            Command::PlayItem(item) => self.start(item, Duration::ZERO).await,
            Command::Resume => self.resume().await,
            Command::Pause | Command::HostPause => self.pause().await,
            Command::PlayPause => {
                if self.snapshot().is_playing {
                    self.pause().await
                } else {
                    self.resume().await
                }
            }
            Command::Seek(position) => self.seek(position).await,
            Command::FastForward => {
                let target = self.current_position().await + self.config.seek_increment;
                self.seek(target).await
            }
            Command::Rewind => {
                let target = self
                    .current_position()
                    .await
                    .saturating_sub(self.config.seek_increment);
                self.seek(target).await
            }
            Command::Stop { by_user } => self.stop(by_user).await,
            Command::LoadQueue { scope_id, start_id } => {
                self.load_queue(&scope_id, start_id).await
            }
            Command::SkipToNext => {
                let next = self.queue.next().map(str::to_string);
                self.skip_to(next).await
            }
            Command::SkipToPrevious => {
                let previous = self.queue.previous().map(str::to_string);
                self.skip_to(previous).await
            }
            Command::SetRepeatMode(mode) => {
                self.update(|state| state.repeat_mode = mode).await;
                Ok(())
            }
            Command::SetSpeed(speed) => self.set_speed(speed).await,
            Command::ToggleSpeed => self.set_speed(self.current_speed().next()).await,
            Command::HostResume => {
                let state = self.snapshot();
                if !state.is_playing && state.status == PlaybackStatus::Ready {
                    self.resume().await
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn play(&mut self, id: &str) -> Result<()> {
        let item = match self.catalog.find_media_item(id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(media_id = id, "Media not found");
                self.unload().await;
                let error = PlaybackError::NotFound(id.to_string());
                return Err(self.fail(error, Some(id.to_string())).await);
            }
            Err(e) => {
                warn!(media_id = id, error = %e, "Media lookup failed");
                self.unload().await;
                return Err(self.fail(e, Some(id.to_string())).await);
            }
        };

        self.start(item, Duration::ZERO).await
    }

    /// Drop whatever source is loaded, prepared or not, and give focus back.
    async fn unload(&mut self) {
        if let Some(previous) = self.current.take() {
            debug!(media_id = %previous.id, "Unloading source");
            if let Err(e) = self.backend.stop().await {
                warn!(error = %e, "Failed to stop previous source");
            }
        }
        self.initialized = false;
        self.resume_position = Duration::ZERO;
        if self.focus.has_focus() {
            self.focus.abandon().await;
        }
    }

    /// Load `item` into the backend and prepare it once focus is held.
    async fn start(&mut self, item: MediaItem, resume_position: Duration) -> Result<()> {
        if self.snapshot().is_playing {
            if let Err(e) = self.backend.pause().await {
                warn!(error = %e, "Failed to pause previous source");
            }
        }

        info!(media_id = %item.id, title = %item.title, "Loading media");
        self.queue.set_current(&item.id);
        self.initialized = false;
        self.pause_requested = false;
        self.announced = false;
        self.resume_position = resume_position;

        if let Err(e) = self.backend.set_source(&item.uri).await {
            return Err(self.fail(e.into(), Some(item.id)).await);
        }

        let media_id = item.id.clone();
        let title = item.title.clone();
        let duration = item.duration;
        self.current = Some(item);

        let granted = self.focus.request_playback().await;
        let status = if granted {
            PlaybackStatus::Buffering
        } else {
            PlaybackStatus::Idle
        };
        self.update(|state| {
            state.status = status;
            state.media_id = Some(media_id);
            state.title = Some(title);
            state.duration = duration;
            state.position = resume_position;
            state.is_playing = false;
            state.error = None;
        })
        .await;

        if !granted {
            info!("Audio focus denied, playback not started");
            return Err(PlaybackError::FocusDenied);
        }

        if let Err(e) = self.backend.prepare().await {
            let media_id = self.media_id();
            return Err(self.fail(e.into(), media_id).await);
        }
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        let state = self.snapshot();
        if state.status == PlaybackStatus::Stopped {
            debug!("Session was stopped, play an item to continue");
            return Ok(());
        }

        if !self.initialized {
            let item = match (&self.current, self.queue.current()) {
                (Some(item), _) => item.clone(),
                (None, Some(id)) => {
                    let id = id.to_string();
                    return self.play(&id).await;
                }
                (None, None) => {
                    debug!("Nothing to resume");
                    return Ok(());
                }
            };
            let position = match state.status {
                PlaybackStatus::Ended | PlaybackStatus::Error => Duration::ZERO,
                _ => state.position,
            };
            return self.start(item, position).await;
        }

        if !self.focus.request_playback().await {
            info!("Audio focus denied, playback not resumed");
            return Err(PlaybackError::FocusDenied);
        }

        if state.has_ended() {
            if let Err(e) = self.backend.seek_to(Duration::ZERO).await {
                let media_id = self.media_id();
                return Err(self.fail(e.into(), media_id).await);
            }
            self.update(|state| state.position = Duration::ZERO).await;
        }

        self.pause_requested = false;
        if let Err(e) = self.backend.play().await {
            let media_id = self.media_id();
            return Err(self.fail(e.into(), media_id).await);
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.focus.cancel_resume();
        if !self.snapshot().is_active() {
            debug!("Nothing to pause");
            return Ok(());
        }

        self.pause_requested = true;

        if self.initialized {
            if let Err(e) = self.backend.pause().await {
                let media_id = self.media_id();
                return Err(self.fail(e.into(), media_id).await);
            }
        }

        let position = self.current_position().await;
        self.update(|state| {
            state.status = PlaybackStatus::Paused;
            state.is_playing = false;
            state.position = position;
        })
        .await;

        if let Some(media_id) = self.media_id() {
            self.emit(PlaybackEvent::Paused {
                media_id,
                position_ms: position.as_millis() as u64,
            });
        }
        Ok(())
    }

    async fn seek(&mut self, target: Duration) -> Result<()> {
        let duration = self.snapshot().duration;
        let position = match duration {
            Some(duration) => target.min(duration),
            None => target,
        };

        if self.initialized {
            if let Err(e) = self.backend.seek_to(position).await {
                let media_id = self.media_id();
                return Err(self.fail(e.into(), media_id).await);
            }
        } else {
            self.resume_position = position;
        }

        self.update(|state| state.position = position).await;
        self.emit(PlaybackEvent::Seeked {
            media_id: self.media_id(),
            position_ms: position.as_millis() as u64,
            duration_ms: duration.map(|d| d.as_millis() as u64),
        });
        Ok(())
    }

    async fn stop(&mut self, by_user: bool) -> Result<()> {
        if self.current.is_some() {
            if let Err(e) = self.backend.stop().await {
                warn!(error = %e, "Media backend stop failed");
            }
        }

        self.initialized = false;
        self.pause_requested = false;
        self.resume_position = Duration::ZERO;

        let status = if by_user {
            PlaybackStatus::Idle
        } else {
            PlaybackStatus::Stopped
        };
        self.update(|state| {
            state.status = status;
            state.is_playing = false;
            state.position = Duration::ZERO;
        })
        .await;

        self.focus.abandon().await;
        self.emit(PlaybackEvent::Stopped {
            media_id: self.media_id(),
            by_user,
        });
        Ok(())
    }

    async fn load_queue(&mut self, scope_id: &str, start_id: Option<String>) -> Result<()> {
        let items = self.catalog.queue_items(scope_id).await?;
        debug!(scope_id, count = items.len(), "Queue loaded");

        self.queue
            .set_items(items.iter().map(|item| item.id.clone()).collect());
        self.update(|_| {}).await;

        let Some(start_id) = start_id else {
            return Ok(());
        };
        match items.into_iter().find(|item| item.id == start_id) {
            Some(item) => self.start(item, Duration::ZERO).await,
            None => self.play(&start_id).await,
        }
    }

    async fn skip_to(&mut self, id: Option<String>) -> Result<()> {
        match id {
            Some(id) => self.play(&id).await,
            None => {
                debug!("No queue item to skip to");
                Ok(())
            }
        }
    }

    async fn set_speed(&mut self, speed: PlaybackSpeed) -> Result<()> {
        if speed == self.current_speed() {
            return Ok(());
        }

        self.backend.set_speed(speed.multiplier()).await?;
        self.speed.send_replace(speed);

        let snapshot = self.snapshot();
        self.ticker.restart(&snapshot, speed).await;

        info!(multiplier = speed.multiplier(), "Playback speed changed");
        self.emit(PlaybackEvent::SpeedChanged {
            multiplier_percent: speed.percent(),
        });
        Ok(())
    }

    // ===== Backend events =====

    async fn handle_backend_event(&mut self, event: BackendEvent) {
        debug!(?event, "Backend event");
        match event {
            BackendEvent::Prepared | BackendEvent::Buffering | BackendEvent::Ready
                if !self.source_is_live() =>
            {
                debug!(?event, "Ignoring event for an unloaded source");
            }
            BackendEvent::Prepared => self.on_prepared().await,
            BackendEvent::Buffering => {
                self.update(|state| state.status = PlaybackStatus::Buffering)
                    .await;
            }
            BackendEvent::Ready => {
                let playing = self.snapshot().is_playing && self.focus.has_focus();
                let status = if playing {
                    PlaybackStatus::Playing
                } else if self.pause_requested {
                    PlaybackStatus::Paused
                } else {
                    PlaybackStatus::Ready
                };
                self.update(|state| state.status = status).await;
            }
            BackendEvent::IsPlayingChanged { is_playing } => {
                self.on_is_playing_changed(is_playing).await
            }
            BackendEvent::Completion => self.on_completion().await,
            BackendEvent::Error { cause } => {
                error!(cause = %cause, "Media backend error");
                let media_id = self.media_id();
                self.fail(PlaybackError::BackendFailure(cause), media_id)
                    .await;
            }
        }
    }

    /// Whether preparation events still belong to a source the session wants.
    fn source_is_live(&self) -> bool {
        self.current.is_some()
            && !matches!(
                self.state.borrow().status,
                PlaybackStatus::Error | PlaybackStatus::Idle | PlaybackStatus::Stopped
            )
    }

    async fn on_prepared(&mut self) {
        self.initialized = true;

        if let Ok(clock) = self.backend.clock().await {
            if let Some(duration) = clock.duration {
                self.record_duration(duration).await;
            }
        }

        let resume_position = std::mem::take(&mut self.resume_position);
        if !resume_position.is_zero() {
            if let Err(e) = self.backend.seek_to(resume_position).await {
                let media_id = self.media_id();
                self.fail(e.into(), media_id).await;
                return;
            }
        }

        if self.pause_requested {
            self.update(|state| state.status = PlaybackStatus::Paused)
                .await;
            return;
        }

        self.update(|state| state.status = PlaybackStatus::Ready)
            .await;

        if self.focus.has_focus() {
            if let Err(e) = self.backend.play().await {
                let media_id = self.media_id();
                self.fail(e.into(), media_id).await;
            }
        }
    }

    async fn record_duration(&mut self, duration: Duration) {
        let Some(item) = self.current.as_mut() else {
            return;
        };
        if item.duration == Some(duration) {
            return;
        }

        item.duration = Some(duration);
        let id = item.id.clone();
        if let Err(e) = self.catalog.record_duration(&id, duration).await {
            warn!(media_id = %id, error = %e, "Failed to record media duration");
        }
        self.update(|state| state.duration = Some(duration)).await;
    }

    async fn on_is_playing_changed(&mut self, is_playing: bool) {
        if is_playing && !self.focus.has_focus() {
            warn!("Backend started without audio focus, pausing it");
            if let Err(e) = self.backend.pause().await {
                warn!(error = %e, "Failed to pause backend");
            }
            self.update(|state| {
                state.is_playing = false;
                if state.status == PlaybackStatus::Playing {
                    state.status = PlaybackStatus::Paused;
                }
            })
            .await;
            return;
        }

        let position = self.current_position().await;
        if is_playing {
            self.update(|state| {
                state.is_playing = true;
                state.status = PlaybackStatus::Playing;
                state.position = position;
            })
            .await;

            let Some(item) = &self.current else {
                return;
            };
            let event = if self.announced {
                PlaybackEvent::Resumed {
                    media_id: item.id.clone(),
                    position_ms: position.as_millis() as u64,
                }
            } else {
                PlaybackEvent::Started {
                    media_id: item.id.clone(),
                    title: item.title.clone(),
                }
            };
            self.announced = true;
            self.emit(event);
        } else {
            self.update(|state| {
                state.is_playing = false;
                state.position = position;
                if state.status == PlaybackStatus::Playing {
                    state.status = PlaybackStatus::Paused;
                }
            })
            .await;
        }
    }

    async fn on_completion(&mut self) {
        let repeat_mode = self.snapshot().repeat_mode;
        if let Some(media_id) = self.media_id() {
            info!(media_id = %media_id, ?repeat_mode, "Media completed");
            self.emit(PlaybackEvent::Completed { media_id });
        }

        let next = match repeat_mode {
            RepeatMode::One => {
                self.replay().await;
                return;
            }
            RepeatMode::All => self
                .queue
                .next()
                .map(str::to_string)
                .or_else(|| self.queue.first().map(str::to_string)),
            RepeatMode::None => self.queue.next().map(str::to_string),
        };

        match next {
            Some(id) => {
                if let Err(e) = self.play(&id).await {
                    warn!(media_id = %id, error = %e, "Failed to advance queue");
                }
            }
            None => {
                self.pause_requested = false;
                self.update(|state| {
                    state.status = PlaybackStatus::Ended;
                    state.is_playing = false;
                    state.position = Duration::ZERO;
                })
                .await;
            }
        }
    }

    async fn replay(&mut self) {
        if let Err(e) = self.backend.seek_to(Duration::ZERO).await {
            let media_id = self.media_id();
            self.fail(e.into(), media_id).await;
            return;
        }
        self.update(|state| state.position = Duration::ZERO).await;

        if self.focus.has_focus() {
            if let Err(e) = self.backend.play().await {
                let media_id = self.media_id();
                self.fail(e.into(), media_id).await;
            }
        }
    }

    // ===== Focus =====

    async fn handle_focus_change(&mut self, change: FocusChange) {
        let is_playing = self.snapshot().is_playing;
        let action = self.focus.on_change(change, is_playing);
        debug!(?change, ?action, "Audio focus changed");

        match action {
            FocusAction::Ignore => {}
            FocusAction::Pause { restore_volume } => {
                if restore_volume {
                    self.set_volume(FULL_VOLUME).await;
                }
                self.pause_requested = true;
                if let Err(e) = self.backend.pause().await {
                    warn!(error = %e, "Failed to pause on focus loss");
                }

                let position = self.current_position().await;
                self.update(|state| {
                    state.status = PlaybackStatus::Paused;
                    state.is_playing = false;
                    state.position = position;
                })
                .await;

                self.emit(PlaybackEvent::FocusLost {
                    media_id: self.media_id(),
                    transient: change != FocusChange::Loss,
                });
            }
            FocusAction::Duck { volume } => {
                self.set_volume(volume).await;
                self.emit(PlaybackEvent::FocusLost {
                    media_id: self.media_id(),
                    transient: true,
                });
            }
            FocusAction::Regain {
                restore_volume,
                resume,
            } => {
                if restore_volume {
                    self.set_volume(FULL_VOLUME).await;
                }
                if resume {
                    if let Err(e) = self.resume().await {
                        warn!(error = %e, "Failed to resume after focus gain");
                    }
                }
            }
        }
    }

    async fn set_volume(&self, volume: f32) {
        if let Err(e) = self.backend.set_volume(volume).await {
            warn!(volume, error = %e, "Failed to set volume");
        }
    }
}
