//! In-process audio focus broker.
//!
//! Desktop platforms have no system-wide focus arbitration, so sessions in
//! the same process share this broker. Holders form a stack: the top holds
//! focus, and holders displaced by a transient request stay underneath and
//! get focus back when the transient holder abandons.

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    focus::{AudioFocusBroker, FocusChange, FocusGrant, FocusHolderId, FocusKind, FocusRequest},
};
use parking_lot::Mutex;
use tracing::{debug, info};

struct Holder {
    id: FocusHolderId,
    listener: bridge_traits::focus::FocusListener,
}

impl Holder {
    fn notify(&self, change: FocusChange) {
        if self.listener.send(change).is_err() {
            debug!(holder = %self.id, ?change, "Focus listener dropped");
        }
    }
}

#[derive(Default)]
struct BrokerState {
    stack: Vec<Holder>,
    unavailable: bool,
}

/// Focus broker shared by every playback session of the process.
#[derive(Default)]
pub struct InProcessFocusBroker {
    state: Mutex<BrokerState>,
}

impl InProcessFocusBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deny every request while `false` (e.g. during a call).
    pub fn set_available(&self, available: bool) {
        self.state.lock().unavailable = !available;
    }

    /// Holder currently owning focus.
    pub fn current_holder(&self) -> Option<FocusHolderId> {
        self.state.lock().stack.last().map(|h| h.id)
    }

    fn loss_for(kind: FocusKind) -> FocusChange {
        match kind {
            FocusKind::Gain => FocusChange::Loss,
            FocusKind::GainTransient => FocusChange::LossTransient,
            FocusKind::GainTransientMayDuck => FocusChange::LossTransientCanDuck,
        }
    }
}

#[async_trait]
impl AudioFocusBroker for InProcessFocusBroker {
    async fn request(&self, request: FocusRequest) -> Result<FocusGrant> {
        let mut state = self.state.lock();
        if state.unavailable {
            debug!(holder = %request.holder, "Focus denied, broker unavailable");
            return Ok(FocusGrant::Denied);
        }

        if let Some(top) = state.stack.last_mut() {
            if top.id == request.holder {
                top.listener = request.listener;
                return Ok(FocusGrant::Granted);
            }
        }

        state.stack.retain(|h| h.id != request.holder);

        let change = Self::loss_for(request.kind);
        if let Some(top) = state.stack.last() {
            info!(from = %top.id, to = %request.holder, ?change, "Audio focus moved");
            top.notify(change);
        }
        if change == FocusChange::Loss {
            state.stack.clear();
        }

        state.stack.push(Holder {
            id: request.holder,
            listener: request.listener,
        });
        Ok(FocusGrant::Granted)
    }

    async fn abandon(&self, holder: FocusHolderId) -> Result<()> {
        let mut state = self.state.lock();
        let was_top = state.stack.last().map(|h| h.id) == Some(holder);
        state.stack.retain(|h| h.id != holder);

        if was_top {
            if let Some(top) = state.stack.last() {
                debug!(holder = %top.id, "Audio focus returned");
                top.notify(FocusChange::Gain);
            }
        }
        Ok(())
    }
}
