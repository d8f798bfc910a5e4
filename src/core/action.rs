//! The machine's command vocabulary.

use super::error::ExperienceStateError;
use crate::effects::SideEffect;
use crate::model::{Experience, StepMetadata};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Addresses a step of the current experience.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepReference {
    /// Absolute flat index.
    Index(usize),
    /// Step id.
    Id(Uuid),
    /// Offset from the current flat index.
    Offset(isize),
}

impl StepReference {
    /// Resolve against `experience` while positioned at `current`.
    /// Returns `None` when the target does not exist.
    pub fn resolve(&self, experience: &Experience, current: usize) -> Option<usize> {
        let count = experience.step_count();
        match *self {
            Self::Index(index) => (index < count).then_some(index),
            Self::Id(id) => experience.flat_index_of(id),
            Self::Offset(offset) => current
                .checked_add_signed(offset)
                .filter(|index| *index < count),
        }
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Self::Offset(1))
    }
}

impl fmt::Display for StepReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "index {index}"),
            Self::Id(id) => write!(f, "id {id}"),
            Self::Offset(offset) => write!(f, "offset {offset:+}"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Action {
    StartExperience(Arc<Experience>),
    StartStep(StepReference),
    RenderStep(StepMetadata),
    /// Accepted by no state; kept so callers can express it without effect.
    EndStep,
    EndExperience {
        mark_complete: bool,
        destroyed: bool,
    },
    Reset,
    Retry,
    ReportError {
        error: ExperienceStateError,
        retry_effect: Option<Box<SideEffect>>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartExperience(_) => "StartExperience",
            Self::StartStep(_) => "StartStep",
            Self::RenderStep(_) => "RenderStep",
            Self::EndStep => "EndStep",
            Self::EndExperience { .. } => "EndExperience",
            Self::Reset => "Reset",
            Self::Retry => "Retry",
            Self::ReportError { .. } => "ReportError",
        }
    }
}
