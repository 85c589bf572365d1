//! # Progress Ticker
//!
//! Publishes [`PlaybackProgressState`] for the current item.
//!
//! ## Overview
//!
//! The session calls [`ProgressTicker::restart`] after every state or speed
//! change. A restart cancels the running tick loop, publishes a fresh
//! snapshot from the backend clock and, while playing, spawns a new loop.
//! Each tick adds one `base_interval` of media time to `elapsed`; ticks fire
//! every `base_interval / speed` of wall-clock time.
//!
//! Cancellation is fenced on the progress channel's lock: once
//! [`ProgressTicker::cancel`] returns, the cancelled loop can no longer
//! publish.

use crate::speed::PlaybackSpeed;
use crate::state::{PlaybackProgressState, PlaybackState, PlaybackStatus};
use bridge_traits::media::{MediaBackend, MediaClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const MIN_DURATION: Duration = Duration::from_millis(1);

struct TickLoop {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct ProgressTicker {
    base_interval: Duration,
    backend: Arc<dyn MediaBackend>,
    progress: watch::Sender<PlaybackProgressState>,
    running: Option<TickLoop>,
}

impl ProgressTicker {
    pub fn new(
        base_interval: Duration,
        backend: Arc<dyn MediaBackend>,
        progress: watch::Sender<PlaybackProgressState>,
    ) -> Self {
        Self {
            base_interval,
            backend,
            progress,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Stop the tick loop. No tick from it is published after this returns.
    pub fn cancel(&mut self) {
        if let Some(tick_loop) = self.running.take() {
            tick_loop.token.cancel();
            // Wait out a tick that is mid-publish.
            self.progress.send_if_modified(|_| false);
            tick_loop.handle.abort();
        }
    }

    /// Re-derive progress for `state` and tick while it is playing.
    ///
    /// Nothing is published while idle or when the duration is unknown.
    pub async fn restart(&mut self, state: &PlaybackState, speed: PlaybackSpeed) {
        self.cancel();

        if state.status == PlaybackStatus::Idle {
            return;
        }

        let clock = match self.backend.clock().await {
            Ok(clock) => clock,
            Err(e) => {
                trace!(error = %e, "Backend clock unavailable, using session state");
                MediaClock::new(state.duration, state.position, Duration::ZERO)
            }
        };

        let duration = clock.duration.or(state.duration).unwrap_or_default();
        if duration < MIN_DURATION {
            return;
        }

        let initial = PlaybackProgressState {
            duration,
            position: clock.position.min(duration),
            buffered: clock.buffered,
            elapsed: Duration::ZERO,
        };
        self.progress.send_replace(initial);

        if state.is_progressing() {
            let period = speed.scale_interval(self.base_interval);
            debug!(?period, ?speed, "Starting progress ticks");

            let token = CancellationToken::new();
            let handle = tokio::spawn(tick_loop(
                token.clone(),
                self.backend.clone(),
                self.progress.clone(),
                initial,
                self.base_interval,
                period,
            ));
            self.running = Some(TickLoop { token, handle });
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn tick_loop(
    token: CancellationToken,
    backend: Arc<dyn MediaBackend>,
    progress: watch::Sender<PlaybackProgressState>,
    initial: PlaybackProgressState,
    base_interval: Duration,
    period: Duration,
) {
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let remaining = initial.duration.saturating_sub(initial.position);
    let mut elapsed = Duration::ZERO;
    let mut buffered = initial.buffered;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticks.tick() => {}
        }

        if let Ok(clock) = backend.clock().await {
            buffered = clock.buffered;
        }
        elapsed = (elapsed + base_interval).min(remaining);

        let published = progress.send_if_modified(|current| {
            if token.is_cancelled() {
                return false;
            }
            *current = PlaybackProgressState {
                elapsed,
                buffered,
                ..initial
            };
            true
        });

        if !published {
            break;
        }
        trace!(elapsed_ms = elapsed.as_millis() as u64, "Progress tick");
    }
}
