//! Audio focus bridge trait.
//!
//! Audio focus is a host-arbitrated permission to render sound. Each request
//! names its holder and carries a listener; the broker uses the listener to
//! tell the holder when another request displaces it and when focus comes
//! back.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Identifier of a focus holder (usually one per playback session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FocusHolderId(Uuid);

impl FocusHolderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FocusHolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FocusHolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of focus being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusKind {
    /// Long-lived focus, e.g. media playback.
    Gain,
    /// Short interruption after which the previous holder gets focus back.
    GainTransient,
    /// Short interruption during which the previous holder may keep
    /// playing at reduced volume.
    GainTransientMayDuck,
}

/// Outcome of a focus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusGrant {
    Granted,
    Denied,
}

impl FocusGrant {
    pub fn is_granted(self) -> bool {
        matches!(self, FocusGrant::Granted)
    }
}

/// Notification delivered to a holder's listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusChange {
    /// Focus lost for an unbounded time. The holder should pause and not
    /// resume on its own.
    Loss,
    /// Focus lost temporarily. The holder should pause and expect `Gain`.
    LossTransient,
    /// Focus lost temporarily; the holder may keep playing quietly.
    LossTransientCanDuck,
    /// Focus returned to the holder.
    Gain,
}

impl FocusChange {
    pub fn is_loss(self) -> bool {
        !matches!(self, FocusChange::Gain)
    }
}

pub type FocusListener = mpsc::UnboundedSender<FocusChange>;

/// A request for audio focus.
#[derive(Debug, Clone)]
pub struct FocusRequest {
    pub holder: FocusHolderId,
    pub kind: FocusKind,
    pub listener: FocusListener,
}

impl FocusRequest {
    pub fn new(holder: FocusHolderId, kind: FocusKind, listener: FocusListener) -> Self {
        Self {
            holder,
            kind,
            listener,
        }
    }
}

/// Host audio focus broker.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::focus::{AudioFocusBroker, FocusHolderId, FocusKind, FocusRequest};
///
/// async fn start(broker: &dyn AudioFocusBroker) -> bridge_traits::error::Result<bool> {
///     let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
///     let request = FocusRequest::new(FocusHolderId::new(), FocusKind::Gain, tx);
///     Ok(broker.request(request).await?.is_granted())
/// }
/// ```
#[async_trait::async_trait]
pub trait AudioFocusBroker: Send + Sync {
    /// Ask for focus. A granted request replaces any listener previously
    /// registered by the same holder.
    async fn request(&self, request: FocusRequest) -> Result<FocusGrant>;

    /// Give focus up. Abandoning without holding focus is a no-op.
    async fn abandon(&self, holder: FocusHolderId) -> Result<()>;
}
