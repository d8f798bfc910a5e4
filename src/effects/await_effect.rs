//! Handshake between the machine and the UI.
//!
//! An await effect suspends until the UI reports that its own animation
//! finished, then yields a fixed follow-up action. The waiting half stays
//! with the effect; the UI only ever sees the [`AwaitResolver`].

use crate::core::Action;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// What the UI is being asked to finish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AwaitKind {
    /// Swap to another step container.
    Continuation,
    /// Dismiss the experience.
    Dismiss,
}

/// The resolving half. Cloning shares the same single-use signal.
#[derive(Clone)]
pub struct AwaitResolver {
    kind: AwaitKind,
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AwaitResolver {
    pub fn kind(&self) -> AwaitKind {
        self.kind
    }

    /// Release the waiting effect. Returns `false` if it was already
    /// resolved or abandoned; repeated calls are harmless.
    pub fn resolve(&self) -> bool {
        let sender = self.sender.lock().take();
        match sender {
            Some(sender) => {
                let delivered = sender.send(()).is_ok();
                debug!(kind = ?self.kind, delivered, "await resolved");
                delivered
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Drop the signal without resolving; the waiting effect yields nothing.
    pub(crate) fn abandon(&self) {
        if self.sender.lock().take().is_some() {
            debug!(kind = ?self.kind, "await abandoned");
        }
    }
}

impl fmt::Debug for AwaitResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitResolver")
            .field("kind", &self.kind)
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// The waiting half, launched by the machine as a side effect.
#[derive(Clone)]
pub struct AwaitEffect {
    kind: AwaitKind,
    action: Action,
    receiver: Arc<Mutex<Option<oneshot::Receiver<()>>>>,
}

impl AwaitEffect {
    pub fn new(kind: AwaitKind, action: Action) -> (Self, AwaitResolver) {
        let (sender, receiver) = oneshot::channel();
        let effect = Self {
            kind,
            action,
            receiver: Arc::new(Mutex::new(Some(receiver))),
        };
        let resolver = AwaitResolver {
            kind,
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        (effect, resolver)
    }

    pub fn kind(&self) -> AwaitKind {
        self.kind
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Wait for the resolver. Only the first launch waits; the signal is
    /// single-use, so any later launch yields `None` immediately.
    pub async fn launch(&self) -> Option<Action> {
        let receiver = self.receiver.lock().take()?;
        match receiver.await {
            Ok(()) => Some(self.action.clone()),
            Err(_) => None,
        }
    }
}

impl fmt::Debug for AwaitEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaitEffect")
            .field("kind", &self.kind)
            .field("action", &self.action.name())
            .finish()
    }
}
