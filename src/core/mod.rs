//! Pure core of the experience state machine.
//!
//! This module contains the logic that never performs I/O:
//! - The action vocabulary and step references
//! - States and the `take` transition function
//! - Experience validation
//! - Immutable history tracking
//!
//! Running side effects and serializing access belong to `effects`.

mod action;
mod error;
mod history;
mod state;
mod transition;
mod validation;

pub use action::{Action, StepReference};
pub use error::ExperienceStateError;
pub use history::{StateHistory, StateTransition, DEFAULT_HISTORY_LIMIT};
pub use state::{
    BeginningExperienceState, BeginningStepState, EndingExperienceState, EndingStepState,
    FailingState, RenderingStepState, State, StateKind,
};
pub use transition::Transition;
pub use validation::{check_experience, validate_experience, ExperienceProblem};
