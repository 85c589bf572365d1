//! # Focus Arbiter
//!
//! Gates playback on holding audio focus and turns the broker's
//! notifications into actions for the session.
//!
//! ## Overview
//!
//! The arbiter owns the session's holder id and the receiving end of its
//! focus listener. Playback may only start or resume while
//! [`FocusArbiter::has_focus`] is true. Loss notifications map to:
//!
//! | Change | Playing | Action |
//! |--------|---------|--------|
//! | `Loss` | yes | pause, never resume on its own |
//! | `LossTransient` | yes | pause, resume on `Gain` |
//! | `LossTransientCanDuck` | yes | duck (or pause, when ducking is off) |
//! | `Gain` | - | restore volume, resume if paused by a transient loss |

use crate::config::PlaybackConfig;
use bridge_traits::focus::{
    AudioFocusBroker, FocusChange, FocusHolderId, FocusKind, FocusListener, FocusRequest,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiving end of a session's focus listener.
pub type FocusChangeReceiver = mpsc::UnboundedReceiver<FocusChange>;

/// What the session should do in response to a focus change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FocusAction {
    Ignore,
    /// Pause the backend; restore full volume first when ducked.
    Pause { restore_volume: bool },
    /// Keep playing at `volume`.
    Duck { volume: f32 },
    /// Focus is back.
    Regain { restore_volume: bool, resume: bool },
}

pub struct FocusArbiter {
    broker: Arc<dyn AudioFocusBroker>,
    holder: FocusHolderId,
    listener: FocusListener,
    held: bool,
    /// Set while focus is away on a transient loss; only then may `Gain` restore it.
    lost_transiently: bool,
    resume_on_gain: bool,
    ducked: bool,
    duck_on_transient_loss: bool,
    duck_volume: f32,
}

impl FocusArbiter {
    pub fn new(
        broker: Arc<dyn AudioFocusBroker>,
        config: &PlaybackConfig,
    ) -> (Self, FocusChangeReceiver) {
        let (listener, changes) = mpsc::unbounded_channel();
        let arbiter = Self {
            broker,
            holder: FocusHolderId::new(),
            listener,
            held: false,
            lost_transiently: false,
            resume_on_gain: false,
            ducked: false,
            duck_on_transient_loss: config.duck_on_transient_loss,
            duck_volume: config.duck_volume,
        };
        (arbiter, changes)
    }

    pub fn holder(&self) -> FocusHolderId {
        self.holder
    }

    pub fn has_focus(&self) -> bool {
        self.held
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    /// Ask the broker for playback focus.
    ///
    /// Broker failures count as a denial.
    pub async fn request_playback(&mut self) -> bool {
        if self.held {
            return true;
        }

        let request = FocusRequest::new(self.holder, FocusKind::Gain, self.listener.clone());
        self.held = match self.broker.request(request).await {
            Ok(grant) => grant.is_granted(),
            Err(e) => {
                warn!(holder = %self.holder, error = %e, "Focus request failed");
                false
            }
        };

        if self.held {
            self.lost_transiently = false;
            self.resume_on_gain = false;
        }
        debug!(holder = %self.holder, granted = self.held, "Audio focus requested");
        self.held
    }

    /// Give focus back to the broker.
    pub async fn abandon(&mut self) {
        self.held = false;
        self.lost_transiently = false;
        self.resume_on_gain = false;
        self.ducked = false;

        if let Err(e) = self.broker.abandon(self.holder).await {
            warn!(holder = %self.holder, error = %e, "Focus abandon failed");
        }
    }

    /// Forget a pending resume, e.g. after the user paused explicitly.
    pub fn cancel_resume(&mut self) {
        self.resume_on_gain = false;
    }

    /// Decide how to react to `change` given whether the session is playing.
    pub fn on_change(&mut self, change: FocusChange, is_playing: bool) -> FocusAction {
        match change {
            FocusChange::Loss => {
                self.held = false;
                self.lost_transiently = false;
                self.resume_on_gain = false;
                let restore_volume = std::mem::take(&mut self.ducked);
                if is_playing {
                    FocusAction::Pause { restore_volume }
                } else {
                    FocusAction::Ignore
                }
            }
            FocusChange::LossTransientCanDuck if self.duck_on_transient_loss && is_playing => {
                self.ducked = true;
                FocusAction::Duck {
                    volume: self.duck_volume,
                }
            }
            FocusChange::LossTransient | FocusChange::LossTransientCanDuck => {
                self.lost_transiently = self.held || self.lost_transiently;
                self.held = false;
                let restore_volume = std::mem::take(&mut self.ducked);
                if is_playing {
                    self.resume_on_gain = true;
                    FocusAction::Pause { restore_volume }
                } else {
                    FocusAction::Ignore
                }
            }
            FocusChange::Gain => {
                if !self.held && !self.lost_transiently {
                    debug!(holder = %self.holder, "Ignoring gain for focus that was not lent out");
                    return FocusAction::Ignore;
                }
                self.held = true;
                self.lost_transiently = false;
                let restore_volume = std::mem::take(&mut self.ducked);
                let resume = std::mem::take(&mut self.resume_on_gain);
                if restore_volume || resume {
                    FocusAction::Regain {
                        restore_volume,
                        resume,
                    }
                } else {
                    FocusAction::Ignore
                }
            }
        }
    }
}
