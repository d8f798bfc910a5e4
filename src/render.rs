//! Directory of render surfaces and the machines that own them.

use crate::core::{Action, ExperienceStateError, State};
use crate::effects::StateMachine;
use crate::model::{Experience, Priority};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Where an experience is drawn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderContext {
    Modal,
    Embed { frame_id: String },
}

impl fmt::Display for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Modal => write!(f, "modal"),
            Self::Embed { frame_id } => write!(f, "embed '{frame_id}'"),
        }
    }
}

/// Maps each render context to the machine that owns it.
#[derive(Clone, Debug, Default)]
pub struct RenderContextDirectory {
    owners: Arc<RwLock<HashMap<RenderContext, StateMachine>>>,
}

impl RenderContextDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `machine` the owner of `context`, returning the previous owner.
    pub fn register(&self, context: RenderContext, machine: StateMachine) -> Option<StateMachine> {
        debug!(context = %context, "render context registered");
        self.owners.write().insert(context, machine)
    }

    /// Release `context`. Its surface is gone, so any active experience is
    /// ended as destroyed.
    pub async fn unregister(&self, context: &RenderContext) -> Option<StateMachine> {
        let machine = self.owners.write().remove(context)?;
        if !machine.state().is_idle() {
            if let Err(error) = machine.end_experience(false, true).await {
                debug!(context = %context, error = %error, "teardown end had no effect");
            }
        }
        debug!(context = %context, "render context unregistered");
        Some(machine)
    }

    pub fn machine(&self, context: &RenderContext) -> Result<StateMachine, ExperienceStateError> {
        self.owners
            .read()
            .get(context)
            .cloned()
            .ok_or_else(|| ExperienceStateError::RenderContextNotActive {
                context: context.clone(),
            })
    }

    pub fn contexts(&self) -> Vec<RenderContext> {
        self.owners.read().keys().cloned().collect()
    }

    /// Start `experience` in `context`.
    ///
    /// A normal priority experience replaces one that is already showing;
    /// a low priority one is refused with `ExperienceAlreadyActive`.
    pub async fn show(
        &self,
        context: &RenderContext,
        experience: Arc<Experience>,
    ) -> Result<State, ExperienceStateError> {
        let machine = self.machine(context)?;

        if experience.priority == Priority::Normal && !machine.state().is_idle() {
            info!(
                context = %context,
                experience = %experience.id,
                "preempting active experience"
            );
            // The teardown chain runs to Idling before the start is taken.
            machine.end_experience(false, true).await?;
        }

        machine.handle_action(Action::StartExperience(experience)).await
    }

    pub async fn dismiss(
        &self,
        context: &RenderContext,
        mark_complete: bool,
        destroyed: bool,
    ) -> Result<State, ExperienceStateError> {
        self.machine(context)?
            .end_experience(mark_complete, destroyed)
            .await
    }
}
