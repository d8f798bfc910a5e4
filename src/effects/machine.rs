//! The experience state machine: a single task that owns the current state.
//!
//! External callers talk to it through [`StateMachine::handle_action`].
//! Follow-up actions produced by side effects come back on an internal
//! channel that always wins over external requests, and while a chained
//! effect is in flight no external request is taken at all. One external
//! action therefore unfolds its whole auto-advance chain before the next
//! one is looked at, without ever recursing.

use super::side_effect::{EffectEnv, SideEffect};
use crate::config::MachineConfig;
use crate::core::{
    Action, ExperienceStateError, State, StateHistory, StateKind, StateTransition, Transition,
};
use crate::effects::ActionProcessor;
use crate::model::Experience;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

type Reply = oneshot::Sender<Result<State, ExperienceStateError>>;

struct Request {
    action: Action,
    reply: Reply,
}

struct FollowUp {
    action: Option<Action>,
    chained: bool,
}

/// State readable without going through the machine task.
struct Published {
    current: RwLock<State>,
    history: RwLock<StateHistory>,
    states: broadcast::Sender<State>,
    /// Lossless subscribers; dropped receivers are pruned on commit.
    watchers: Mutex<Vec<mpsc::UnboundedSender<State>>>,
    errors: broadcast::Sender<ExperienceStateError>,
}

/// Cloneable handle to a running machine. The machine task stops once
/// every handle is dropped.
#[derive(Clone)]
pub struct StateMachine {
    requests: mpsc::UnboundedSender<Request>,
    published: Arc<Published>,
}

impl StateMachine {
    /// Spawn a machine in `Idling`. Must be called inside a Tokio runtime.
    pub(crate) fn spawn(config: &MachineConfig, processor: ActionProcessor) -> Self {
        let (requests, external) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (states, _) = broadcast::channel(config.channel_capacity);
        let (errors, _) = broadcast::channel(config.channel_capacity);

        let published = Arc::new(Published {
            current: RwLock::new(State::Idling),
            history: RwLock::new(StateHistory::new(config.history_limit)),
            states,
            watchers: Mutex::new(Vec::new()),
            errors,
        });

        let core = MachineCore {
            state: State::Idling,
            published: Arc::clone(&published),
            env: EffectEnv {
                processor,
                max_presentation_retries: config.max_presentation_retries,
            },
            external,
            internal_tx,
            internal_rx,
            in_flight: 0,
        };
        tokio::spawn(core.run());

        Self {
            requests,
            published,
        }
    }

    /// Offer `action` to the machine.
    ///
    /// Resolves as soon as the first transition is committed; later states
    /// of an auto-advance chain are only visible through [`subscribe`].
    /// An action that means nothing in the current state succeeds with the
    /// unchanged state.
    ///
    /// [`subscribe`]: StateMachine::subscribe
    pub async fn handle_action(&self, action: Action) -> Result<State, ExperienceStateError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request { action, reply })
            .map_err(|_| ExperienceStateError::MachineStopped)?;
        response
            .await
            .map_err(|_| ExperienceStateError::MachineStopped)?
    }

    pub async fn start_experience(
        &self,
        experience: Arc<Experience>,
    ) -> Result<State, ExperienceStateError> {
        self.handle_action(Action::StartExperience(experience)).await
    }

    pub async fn end_experience(
        &self,
        mark_complete: bool,
        destroyed: bool,
    ) -> Result<State, ExperienceStateError> {
        self.handle_action(Action::EndExperience {
            mark_complete,
            destroyed,
        })
        .await
    }

    /// The most recently committed state.
    pub fn state(&self) -> State {
        self.published.current.read().clone()
    }

    /// Committed states, in commit order.
    ///
    /// The channel holds `channel_capacity` states. A receiver that falls
    /// further behind skips the oldest ones and gets
    /// [`RecvError::Lagged`](broadcast::error::RecvError::Lagged) with the
    /// number missed. Use [`subscribe_all`] when every state matters.
    ///
    /// [`subscribe_all`]: StateMachine::subscribe_all
    pub fn subscribe(&self) -> broadcast::Receiver<State> {
        self.published.states.subscribe()
    }

    /// Every state committed from now on, in commit order, with no loss.
    ///
    /// The buffer is unbounded, so the receiver must be drained or dropped.
    pub fn subscribe_all(&self) -> mpsc::UnboundedReceiver<State> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.published.watchers.lock().push(sender);
        receiver
    }

    /// Reported errors, plus rejections of internal follow-ups that no
    /// caller is waiting for.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ExperienceStateError> {
        self.published.errors.subscribe()
    }

    pub fn history(&self) -> StateHistory {
        self.published.history.read().clone()
    }
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.published.current.read().name())
            .finish()
    }
}

/// Owned by the machine task; the only place a state is ever committed.
struct MachineCore {
    state: State,
    published: Arc<Published>,
    env: EffectEnv,
    external: mpsc::UnboundedReceiver<Request>,
    internal_tx: mpsc::UnboundedSender<FollowUp>,
    internal_rx: mpsc::UnboundedReceiver<FollowUp>,
    in_flight: usize,
}

impl MachineCore {
    async fn run(mut self) {
        loop {
            if self.in_flight > 0 {
                // internal_tx lives in self, so this never yields None.
                if let Some(follow_up) = self.internal_rx.recv().await {
                    self.follow_up(follow_up);
                }
                continue;
            }

            tokio::select! {
                biased;
                Some(follow_up) = self.internal_rx.recv() => self.follow_up(follow_up),
                request = self.external.recv() => match request {
                    Some(Request { action, reply }) => {
                        let result = self.dispatch(action);
                        if let Err(error) = &result {
                            debug!(error = %error, state = self.state.name(), "action rejected");
                        }
                        let _ = reply.send(result);
                    }
                    None => break,
                },
            }
        }
        debug!("state machine stopped");
    }

    fn follow_up(&mut self, follow_up: FollowUp) {
        if follow_up.chained {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        let Some(action) = follow_up.action else {
            return;
        };
        if let Err(error) = self.dispatch(action) {
            // Nobody awaits an internal action, so surface the rejection.
            warn!(error = %error, state = self.state.name(), "follow-up action rejected");
            let _ = self.published.errors.send(error);
        }
    }

    fn dispatch(&mut self, action: Action) -> Result<State, ExperienceStateError> {
        if let Action::ReportError { error, .. } = &action {
            warn!(error = %error, state = self.state.name(), "experience error reported");
            let _ = self.published.errors.send(error.clone());
        }

        let name = action.name();
        match self.state.take(action) {
            None => {
                debug!(action = name, state = self.state.name(), "action ignored");
                Ok(self.state.clone())
            }
            Some(Transition::Keep(error)) => Err(error),
            Some(Transition::Next { state, effect }) => {
                self.commit(state);
                if let Some(effect) = effect {
                    self.launch(effect);
                }
                Ok(self.state.clone())
            }
        }
    }

    fn commit(&mut self, next: State) {
        let previous = std::mem::replace(&mut self.state, next);

        // Leaving a pending handshake other than into recovery: the UI's
        // late confirmation must not drive the new state.
        if self.state.kind() != StateKind::Failing {
            if let Some(resolver) = previous.await_resolver() {
                resolver.abandon();
            }
        }

        let record = StateTransition::between(&previous, &self.state);
        {
            let mut history = self.published.history.write();
            *history = history.record(record);
        }
        *self.published.current.write() = self.state.clone();

        debug!(
            from = previous.name(),
            to = self.state.name(),
            experience = ?self.state.current_experience().map(|e| e.id),
            step = ?self.state.current_step_index(),
            "state committed"
        );
        let _ = self.published.states.send(self.state.clone());
        self.published
            .watchers
            .lock()
            .retain(|watcher| watcher.send(self.state.clone()).is_ok());
    }

    fn launch(&mut self, effect: SideEffect) {
        let chained = effect.is_chained();
        if chained {
            self.in_flight += 1;
        }
        debug!(effect = effect.name(), chained, "launching side effect");

        let env = self.env.clone();
        let internal = self.internal_tx.clone();
        tokio::spawn(async move {
            // An effect that panics still has to release the chain.
            let action = match tokio::spawn(async move { effect.launch(&env).await }).await {
                Ok(action) => action,
                Err(error) => {
                    warn!(error = %error, "side effect panicked");
                    None
                }
            };
            let _ = internal.send(FollowUp { action, chained });
        });
    }
}
