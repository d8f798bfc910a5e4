//! Sequential executor for experience actions.

use crate::model::ExperienceAction;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// One queued action; `done` fires once it has finished.
struct Queued {
    action: Arc<dyn ExperienceAction>,
    done: Option<oneshot::Sender<()>>,
}

/// FIFO queue drained by a single background worker.
///
/// Each action runs to completion before the next one starts, so a close
/// queued ahead of a launch always finishes first. `process` never waits,
/// which keeps action execution off the machine's transition path.
#[derive(Clone)]
pub struct ActionProcessor {
    sender: mpsc::UnboundedSender<Queued>,
}

impl ActionProcessor {
    /// Spawn the worker. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(Self::worker_loop(receiver));
        Self { sender }
    }

    /// Append `actions` to the tail of the queue and return immediately.
    pub fn process(&self, actions: Vec<Arc<dyn ExperienceAction>>) {
        for action in actions {
            self.enqueue(action, None);
        }
    }

    /// Like [`process`], but the returned receiver fires once the last of
    /// `actions` has finished, or right away when `actions` is empty. If
    /// the worker is gone the receiver completes with an error instead.
    ///
    /// [`process`]: ActionProcessor::process
    pub fn submit(&self, actions: Vec<Arc<dyn ExperienceAction>>) -> oneshot::Receiver<()> {
        let (done, finished) = oneshot::channel();
        let mut actions = actions.into_iter().peekable();
        if actions.peek().is_none() {
            let _ = done.send(());
            return finished;
        }

        let mut done = Some(done);
        while let Some(action) = actions.next() {
            let signal = if actions.peek().is_none() { done.take() } else { None };
            self.enqueue(action, signal);
        }
        finished
    }

    fn enqueue(&self, action: Arc<dyn ExperienceAction>, done: Option<oneshot::Sender<()>>) {
        if let Err(error) = self.sender.send(Queued { action, done }) {
            warn!(action = error.0.action.name(), "action processor stopped, dropping action");
        }
    }

    async fn worker_loop(mut receiver: mpsc::UnboundedReceiver<Queued>) {
        while let Some(Queued { action, done }) = receiver.recv().await {
            debug!(action = action.name(), "executing experience action");
            // Run on its own task so a panicking action cannot take the
            // queue down with it.
            let running = Arc::clone(&action);
            if let Err(error) = tokio::spawn(async move { running.execute().await }).await {
                warn!(action = action.name(), error = %error, "experience action panicked");
            }
            if let Some(done) = done {
                let _ = done.send(());
            }
        }
        debug!("action processor stopped");
    }
}

impl Default for ActionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ActionProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionProcessor")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
