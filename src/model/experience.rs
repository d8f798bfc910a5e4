//! Immutable description of a guided experience.
//!
//! An experience is an ordered list of step containers, each holding an
//! ordered list of steps. The machine addresses steps by their *flat*
//! index: the position of the step when every container is laid end to end.

use super::capability::{ExperienceAction, MetadataSettingTrait, PresentingTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Whether an experience may preempt one that is already showing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
}

/// What caused an experience to be shown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExperienceTrigger {
    Qualification { reason: Option<String> },
    ShowCall,
    DeepLink,
    Preview,
    ExperienceCompletionAction { from_experience_id: Option<Uuid> },
    LaunchExperienceAction { from_experience_id: Option<Uuid> },
    ScreenViewed,
}

/// An unresolved decorator attached to a step or container. Rendering
/// concerns live outside the machine, so only the declaration is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraitDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

impl TraitDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            config: Value::Null,
        }
    }
}

/// Metadata produced while presenting a step, handed to the renderer with
/// `RenderStep`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetadata {
    values: HashMap<String, Value>,
}

impl StepMetadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Later producers override earlier ones for the same key.
    pub fn extend(&mut self, values: HashMap<String, Value>) {
        self.values.extend(values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct Step {
    pub id: Uuid,
    pub content: Value,
    pub traits: Vec<TraitDescriptor>,
    /// Actions keyed by the id of the element that triggers them.
    pub actions: HashMap<Uuid, Vec<Arc<dyn ExperienceAction>>>,
    pub presenter: Arc<dyn PresentingTrait>,
    pub metadata_traits: Vec<Arc<dyn MetadataSettingTrait>>,
}

impl Step {
    pub fn new(presenter: Arc<dyn PresentingTrait>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: Value::Null,
            traits: Vec::new(),
            actions: HashMap::new(),
            presenter,
            metadata_traits: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }

    pub fn with_trait(mut self, descriptor: TraitDescriptor) -> Self {
        self.traits.push(descriptor);
        self
    }

    pub fn with_action(mut self, element: Uuid, action: Arc<dyn ExperienceAction>) -> Self {
        self.actions.entry(element).or_default().push(action);
        self
    }

    pub fn with_metadata(mut self, producer: Arc<dyn MetadataSettingTrait>) -> Self {
        self.metadata_traits.push(producer);
        self
    }

    pub fn actions_for(&self, element: Uuid) -> &[Arc<dyn ExperienceAction>] {
        self.actions.get(&element).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct StepContainer {
    pub id: Uuid,
    pub steps: Vec<Step>,
    pub traits: Vec<TraitDescriptor>,
    /// Navigation actions run before the container is presented.
    pub actions: Vec<Arc<dyn ExperienceAction>>,
}

impl StepContainer {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: Uuid::new_v4(),
            steps,
            traits: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_trait(mut self, descriptor: TraitDescriptor) -> Self {
        self.traits.push(descriptor);
        self
    }

    pub fn with_navigation(mut self, action: Arc<dyn ExperienceAction>) -> Self {
        self.actions.push(action);
        self
    }
}

/// A fully mapped experience. Never mutated once shared with a machine.
#[derive(Clone, Debug)]
pub struct Experience {
    pub id: Uuid,
    pub name: String,
    pub priority: Priority,
    pub trigger: ExperienceTrigger,
    pub step_containers: Vec<StepContainer>,
    pub completion_actions: Vec<Arc<dyn ExperienceAction>>,
    /// Set when decoding or mapping failed upstream; such an experience is
    /// rejected when started.
    pub error: Option<String>,
}

impl Experience {
    /// Every step across all containers, in presentation order.
    pub fn flat_steps(&self) -> impl Iterator<Item = &Step> + '_ {
        self.step_containers.iter().flat_map(|c| c.steps.iter())
    }

    pub fn step_count(&self) -> usize {
        self.step_containers.iter().map(|c| c.steps.len()).sum()
    }

    pub fn step(&self, flat_index: usize) -> Option<&Step> {
        self.flat_steps().nth(flat_index)
    }

    pub fn is_last_step(&self, flat_index: usize) -> bool {
        flat_index + 1 == self.step_count()
    }

    pub fn flat_index_of(&self, step_id: Uuid) -> Option<usize> {
        self.flat_steps().position(|s| s.id == step_id)
    }

    /// Index of the container holding the step at `flat_index`.
    pub fn container_index_of(&self, flat_index: usize) -> Option<usize> {
        let mut start = 0;
        for (index, container) in self.step_containers.iter().enumerate() {
            let end = start + container.steps.len();
            if flat_index < end {
                return Some(index);
            }
            start = end;
        }
        None
    }

    pub fn container_of(&self, flat_index: usize) -> Option<&StepContainer> {
        self.container_index_of(flat_index)
            .and_then(|i| self.step_containers.get(i))
    }

    /// Flat index of the first step of `container`.
    pub fn container_start(&self, container: usize) -> Option<usize> {
        if container >= self.step_containers.len() {
            return None;
        }
        Some(
            self.step_containers[..container]
                .iter()
                .map(|c| c.steps.len())
                .sum(),
        )
    }
}
