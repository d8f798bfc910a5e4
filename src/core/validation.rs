//! Checks an experience must pass before it can begin.
//!
//! Every problem is collected instead of stopping at the first one, so the
//! resulting error describes the whole experience in a single pass.

use super::error::ExperienceStateError;
use crate::model::Experience;
use std::sync::Arc;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExperienceProblem {
    #[error("{0}")]
    Upstream(String),

    #[error("experience has no step containers")]
    NoStepContainers,

    #[error("step container {index} has no steps")]
    EmptyStepContainer { index: usize },
}

/// Run every check against `experience`, accumulating all problems.
pub fn check_experience(experience: &Experience) -> Validation<(), NonEmptyVec<ExperienceProblem>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<ExperienceProblem>>> = Vec::new();

    if let Some(error) = &experience.error {
        checks.push(Validation::fail(ExperienceProblem::Upstream(error.clone())));
    }

    if experience.step_containers.is_empty() {
        checks.push(Validation::fail(ExperienceProblem::NoStepContainers));
    }

    for (index, container) in experience.step_containers.iter().enumerate() {
        let check = if container.steps.is_empty() {
            Validation::fail(ExperienceProblem::EmptyStepContainer { index })
        } else {
            Validation::success(())
        };
        checks.push(check);
    }

    Validation::all_vec(checks).map(|_| ())
}

/// Convert the accumulated problems into a single `ExperienceError`.
pub fn validate_experience(experience: &Arc<Experience>) -> Result<(), ExperienceStateError> {
    match check_experience(experience) {
        Validation::Success(_) => Ok(()),
        Validation::Failure(problems) => Err(ExperienceStateError::Experience {
            experience: Arc::clone(experience),
            message: problems
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        }),
    }
}
