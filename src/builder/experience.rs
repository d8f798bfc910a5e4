//! Builder for assembling experiences by hand, e.g. in previews and tests.

use crate::model::{Experience, ExperienceAction, ExperienceTrigger, Priority, StepContainer};
use std::sync::Arc;
use uuid::Uuid;

/// Fluent builder for an [`Experience`].
///
/// No validation happens here; an experience that cannot begin is still
/// buildable and is rejected by the machine when started.
pub struct ExperienceBuilder {
    experience: Experience,
}

impl ExperienceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            experience: Experience {
                id: Uuid::new_v4(),
                name: name.into(),
                priority: Priority::Normal,
                trigger: ExperienceTrigger::ShowCall,
                step_containers: Vec::new(),
                completion_actions: Vec::new(),
                error: None,
            },
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.experience.id = id;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.experience.priority = priority;
        self
    }

    pub fn trigger(mut self, trigger: ExperienceTrigger) -> Self {
        self.experience.trigger = trigger;
        self
    }

    pub fn container(mut self, container: StepContainer) -> Self {
        self.experience.step_containers.push(container);
        self
    }

    pub fn completion_action(mut self, action: Arc<dyn ExperienceAction>) -> Self {
        self.experience.completion_actions.push(action);
        self
    }

    /// Mark the experience as failed upstream.
    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.experience.error = Some(message.into());
        self
    }

    pub fn build(self) -> Arc<Experience> {
        Arc::new(self.experience)
    }
}
