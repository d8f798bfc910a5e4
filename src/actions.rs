//! Experience actions that drive the state machine itself.
//!
//! They run on the action processor, never on the machine task, so a
//! close issued from inside an experience re-enters the machine as an
//! ordinary external request.

use crate::core::{Action, StepReference};
use crate::effects::StateMachine;
use crate::model::ExperienceAction;
use async_trait::async_trait;
use tracing::debug;

/// Dismiss the current experience.
#[derive(Debug)]
pub struct CloseAction {
    machine: StateMachine,
    mark_complete: bool,
}

impl CloseAction {
    pub fn new(machine: StateMachine, mark_complete: bool) -> Self {
        Self {
            machine,
            mark_complete,
        }
    }
}

#[async_trait]
impl ExperienceAction for CloseAction {
    fn name(&self) -> &str {
        "close"
    }

    async fn execute(&self) {
        let result = self
            .machine
            .handle_action(Action::EndExperience {
                mark_complete: self.mark_complete,
                destroyed: false,
            })
            .await;
        if let Err(error) = result {
            debug!(error = %error, "close had no effect");
        }
    }
}

/// Move to another step of the current experience.
#[derive(Debug)]
pub struct ContinueAction {
    machine: StateMachine,
    step: StepReference,
}

impl ContinueAction {
    pub fn new(machine: StateMachine, step: StepReference) -> Self {
        Self { machine, step }
    }

    pub fn next(machine: StateMachine) -> Self {
        Self::new(machine, StepReference::Offset(1))
    }
}

#[async_trait]
impl ExperienceAction for ContinueAction {
    fn name(&self) -> &str {
        "continue"
    }

    async fn execute(&self) {
        if let Err(error) = self.machine.handle_action(Action::StartStep(self.step)).await {
            debug!(error = %error, step = %self.step, "continue had no effect");
        }
    }
}
