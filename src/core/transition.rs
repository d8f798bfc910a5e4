//! Result of offering an action to a state.

use super::error::ExperienceStateError;
use super::state::State;
use crate::effects::SideEffect;

/// What a state decided to do with an action.
///
/// `State::take` returns `Option<Transition>`; `None` means the action is
/// meaningless in that state and is ignored.
#[derive(Clone, Debug)]
pub enum Transition {
    /// Stay put and surface the error.
    Keep(ExperienceStateError),

    /// Commit `state`, then launch `effect` if present.
    Next {
        state: State,
        effect: Option<SideEffect>,
    },
}

impl Transition {
    pub fn next(state: State, effect: Option<SideEffect>) -> Self {
        Self::Next { state, effect }
    }

    pub fn keep(error: ExperienceStateError) -> Self {
        Self::Keep(error)
    }

    pub fn state(&self) -> Option<&State> {
        match self {
            Self::Next { state, .. } => Some(state),
            Self::Keep(_) => None,
        }
    }

    pub fn effect(&self) -> Option<&SideEffect> {
        match self {
            Self::Next { effect, .. } => effect.as_ref(),
            Self::Keep(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ExperienceStateError> {
        match self {
            Self::Keep(error) => Some(error),
            Self::Next { .. } => None,
        }
    }
}
