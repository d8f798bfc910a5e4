//! Errors produced by the experience state machine.

use crate::model::Experience;
use crate::render::RenderContext;
use std::sync::Arc;
use thiserror::Error;

/// Why a transition did not happen, or what went wrong while presenting.
#[derive(Clone, Debug, Error)]
pub enum ExperienceStateError {
    /// The experience cannot be started at all.
    #[error("experience '{}' ({}): {message}", .experience.name, .experience.id)]
    Experience {
        experience: Arc<Experience>,
        message: String,
    },

    /// A step could not be reached or presented.
    #[error("experience '{}' step {step_index}: {message}", .experience.name)]
    Step {
        experience: Arc<Experience>,
        step_index: usize,
        message: String,
        recoverable: bool,
    },

    #[error("experience '{}' is already active", .experience.name)]
    ExperienceAlreadyActive { experience: Arc<Experience> },

    #[error("render context {context} has no active state machine")]
    RenderContextNotActive { context: RenderContext },

    #[error("state machine is no longer running")]
    MachineStopped,
}

impl ExperienceStateError {
    /// The experience the error refers to, if any.
    pub fn experience(&self) -> Option<&Arc<Experience>> {
        match self {
            Self::Experience { experience, .. }
            | Self::Step { experience, .. }
            | Self::ExperienceAlreadyActive { experience } => Some(experience),
            Self::RenderContextNotActive { .. } | Self::MachineStopped => None,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Step { recoverable: true, .. })
    }
}
