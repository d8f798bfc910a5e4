//! Lifecycle states of an experience and the transition function.
//!
//! States are immutable values. `take` is pure: it never mutates the state
//! it is called on and never runs side effects, it only describes the next
//! state and the effect the machine should launch.

use super::action::{Action, StepReference};
use super::error::ExperienceStateError;
use super::transition::Transition;
use super::validation::validate_experience;
use crate::effects::{AwaitEffect, AwaitKind, AwaitResolver, PresentationEffect, SideEffect};
use crate::model::{Experience, StepMetadata};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Discriminant of [`State`], cheap to copy, compare and serialize.
///
/// History records and assertions use it where the payload does not matter.
///
/// # Example
///
/// ```rust
/// use experience_machine::core::{State, StateKind};
///
/// assert_eq!(State::default().kind(), StateKind::Idling);
/// assert_eq!(
///     serde_json::to_string(&StateKind::RenderingStep).unwrap(),
///     "\"RenderingStep\""
/// );
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateKind {
    /// No experience is active.
    Idling,
    /// An experience was accepted; its first step has not started.
    BeginningExperience,
    /// A step is being presented.
    BeginningStep,
    /// A step is on screen.
    RenderingStep,
    /// Leaving a step, possibly waiting on the UI.
    EndingStep,
    /// The experience is finishing; completion actions come next.
    EndingExperience,
    /// A presentation failed and waits for `Retry` or abandonment.
    Failing,
}

/// An experience that passed validation and is about to start.
#[derive(Clone, Debug)]
pub struct BeginningExperienceState {
    pub experience: Arc<Experience>,
}

/// A step whose container is being presented.
#[derive(Clone, Debug)]
pub struct BeginningStepState {
    pub experience: Arc<Experience>,
    /// Position across all containers.
    pub flat_step_index: usize,
    /// Whether this is the first step shown for the experience.
    pub is_first: bool,
}

/// A step that is on screen.
#[derive(Clone, Debug)]
pub struct RenderingStepState {
    pub experience: Arc<Experience>,
    pub flat_step_index: usize,
    pub is_first: bool,
    /// Produced by the step's metadata traits while presenting.
    pub metadata: StepMetadata,
}

/// Leaving a step, towards another step or the end of the experience.
#[derive(Clone, Debug)]
pub struct EndingStepState {
    pub experience: Arc<Experience>,
    /// The step being left.
    pub flat_step_index: usize,
    /// Whether leaving counts the step as completed.
    pub mark_complete: bool,
    /// Present when the UI must confirm before the machine continues.
    pub await_effect: Option<AwaitResolver>,
}

/// The experience is finishing; `Reset` returns the machine to idle.
#[derive(Clone, Debug)]
pub struct EndingExperienceState {
    pub experience: Arc<Experience>,
    /// The last step shown.
    pub flat_step_index: usize,
    /// Completion actions run on `Reset` only when this is set.
    pub mark_complete: bool,
}

/// Wraps the state a presentation failure interrupted. Position queries
/// answer for the wrapped state.
#[derive(Clone, Debug)]
pub struct FailingState {
    /// The state `Retry` resumes.
    pub target: Box<State>,
    /// Launched again on `Retry`, usually a recovering presentation.
    pub retry_effect: Option<SideEffect>,
}

/// Where the machine is in an experience's lifecycle.
///
/// States are immutable values; the machine moves by committing the state
/// returned from [`State::take`]. Every variant except `Idling` carries
/// the active experience.
#[derive(Clone, Debug, Default)]
pub enum State {
    #[default]
    Idling,
    BeginningExperience(BeginningExperienceState),
    BeginningStep(BeginningStepState),
    RenderingStep(RenderingStepState),
    EndingStep(EndingStepState),
    EndingExperience(EndingExperienceState),
    Failing(FailingState),
}

impl State {
    /// The variant, without its payload.
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Idling => StateKind::Idling,
            Self::BeginningExperience(_) => StateKind::BeginningExperience,
            Self::BeginningStep(_) => StateKind::BeginningStep,
            Self::RenderingStep(_) => StateKind::RenderingStep,
            Self::EndingStep(_) => StateKind::EndingStep,
            Self::EndingExperience(_) => StateKind::EndingExperience,
            Self::Failing(_) => StateKind::Failing,
        }
    }

    /// Get the state's name for display/logging.
    pub fn name(&self) -> &'static str {
        match self.kind() {
            StateKind::Idling => "Idling",
            StateKind::BeginningExperience => "BeginningExperience",
            StateKind::BeginningStep => "BeginningStep",
            StateKind::RenderingStep => "RenderingStep",
            StateKind::EndingStep => "EndingStep",
            StateKind::EndingExperience => "EndingExperience",
            StateKind::Failing => "Failing",
        }
    }

    /// Check if no experience is active.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idling)
    }

    /// The active experience. `Failing` answers for the state it wraps.
    pub fn current_experience(&self) -> Option<&Arc<Experience>> {
        match self {
            Self::Idling => None,
            Self::BeginningExperience(s) => Some(&s.experience),
            Self::BeginningStep(s) => Some(&s.experience),
            Self::RenderingStep(s) => Some(&s.experience),
            Self::EndingStep(s) => Some(&s.experience),
            Self::EndingExperience(s) => Some(&s.experience),
            Self::Failing(s) => s.target.current_experience(),
        }
    }

    /// Flat index of the current step, once a step has begun.
    pub fn current_step_index(&self) -> Option<usize> {
        match self {
            Self::Idling | Self::BeginningExperience(_) => None,
            Self::BeginningStep(s) => Some(s.flat_step_index),
            Self::RenderingStep(s) => Some(s.flat_step_index),
            Self::EndingStep(s) => Some(s.flat_step_index),
            Self::EndingExperience(s) => Some(s.flat_step_index),
            Self::Failing(s) => s.target.current_step_index(),
        }
    }

    /// The handshake the UI must resolve, while one is pending.
    pub fn await_resolver(&self) -> Option<&AwaitResolver> {
        match self {
            Self::EndingStep(s) => s.await_effect.as_ref(),
            _ => None,
        }
    }

    /// Offer `action` to this state.
    ///
    /// `None` means the action has no meaning here and is ignored. A
    /// conflicting request, such as starting a second experience, is a
    /// `Keep` with an error instead.
    ///
    /// # Example
    ///
    /// ```rust
    /// use async_trait::async_trait;
    /// use experience_machine::builder::ExperienceBuilder;
    /// use experience_machine::core::{Action, State, StateKind};
    /// use experience_machine::model::{PresentingTrait, Step, StepContainer, TraitError};
    /// use std::sync::Arc;
    ///
    /// #[derive(Debug)]
    /// struct Modal;
    ///
    /// #[async_trait]
    /// impl PresentingTrait for Modal {
    ///     async fn present(&self) -> Result<(), TraitError> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let experience = ExperienceBuilder::new("Welcome")
    ///     .container(StepContainer::new(vec![Step::new(Arc::new(Modal))]))
    ///     .build();
    ///
    /// let transition = State::Idling
    ///     .take(Action::StartExperience(experience))
    ///     .unwrap();
    /// assert_eq!(transition.state().map(State::kind), Some(StateKind::BeginningExperience));
    ///
    /// // Nothing to end while idle.
    /// assert!(State::Idling.take(Action::Reset).is_none());
    /// ```
    pub fn take(&self, action: Action) -> Option<Transition> {
        match self {
            Self::Idling => idling(action),
            Self::BeginningExperience(s) => s.take(self, action),
            Self::BeginningStep(s) => s.take(self, action),
            Self::RenderingStep(s) => s.take(self, action),
            Self::EndingStep(s) => s.take(self, action),
            Self::EndingExperience(s) => s.take(self, action),
            Self::Failing(s) => s.take(action),
        }
    }
}

fn idling(action: Action) -> Option<Transition> {
    match action {
        Action::StartExperience(experience) => Some(match validate_experience(&experience) {
            Ok(()) => Transition::next(
                State::BeginningExperience(BeginningExperienceState { experience }),
                Some(SideEffect::Continuation(Action::StartStep(
                    StepReference::Index(0),
                ))),
            ),
            Err(error) => Transition::keep(error),
        }),
        _ => None,
    }
}

fn already_active(experience: &Arc<Experience>) -> Transition {
    Transition::keep(ExperienceStateError::ExperienceAlreadyActive {
        experience: Arc::clone(experience),
    })
}

fn failing(current: &State, retry_effect: Option<Box<SideEffect>>) -> Transition {
    Transition::next(
        State::Failing(FailingState {
            target: Box::new(current.clone()),
            retry_effect: retry_effect.map(|effect| *effect),
        }),
        None,
    )
}

fn step_not_found(
    experience: &Arc<Experience>,
    step_index: usize,
    reference: StepReference,
) -> Transition {
    Transition::keep(ExperienceStateError::Step {
        experience: Arc::clone(experience),
        step_index,
        message: format!("no step at {reference}"),
        recoverable: false,
    })
}

impl BeginningExperienceState {
    fn take(&self, current: &State, action: Action) -> Option<Transition> {
        match action {
            Action::StartExperience(_) => Some(already_active(&self.experience)),
            Action::StartStep(_) => {
                let has_steps = self
                    .experience
                    .step_containers
                    .first()
                    .is_some_and(|container| !container.steps.is_empty());
                if !has_steps {
                    return Some(Transition::keep(ExperienceStateError::Step {
                        experience: Arc::clone(&self.experience),
                        step_index: 0,
                        message: "step container 0 has no steps".to_string(),
                        recoverable: false,
                    }));
                }
                Some(Transition::next(
                    State::BeginningStep(BeginningStepState {
                        experience: Arc::clone(&self.experience),
                        flat_step_index: 0,
                        is_first: true,
                    }),
                    Some(SideEffect::Presentation(PresentationEffect::new(
                        Arc::clone(&self.experience),
                        0,
                        true,
                    ))),
                ))
            }
            Action::ReportError { retry_effect, .. } => Some(failing(current, retry_effect)),
            _ => None,
        }
    }
}

impl BeginningStepState {
    fn take(&self, current: &State, action: Action) -> Option<Transition> {
        match action {
            Action::StartExperience(_) => Some(already_active(&self.experience)),
            Action::RenderStep(metadata) => Some(Transition::next(
                State::RenderingStep(RenderingStepState {
                    experience: Arc::clone(&self.experience),
                    flat_step_index: self.flat_step_index,
                    is_first: self.is_first,
                    metadata,
                }),
                None,
            )),
            Action::ReportError { retry_effect, .. } => Some(failing(current, retry_effect)),
            _ => None,
        }
    }
}

impl RenderingStepState {
    fn take(&self, current: &State, action: Action) -> Option<Transition> {
        match action {
            Action::StartExperience(_) => Some(already_active(&self.experience)),
            Action::StartStep(reference) => Some(self.start_step(reference)),
            Action::EndExperience {
                mark_complete,
                destroyed,
            } => Some(self.end_experience(mark_complete, destroyed)),
            Action::ReportError { retry_effect, .. } => Some(failing(current, retry_effect)),
            _ => None,
        }
    }

    fn start_step(&self, reference: StepReference) -> Transition {
        let current = self.flat_step_index;
        // Advancing past the last step finishes the flow.
        if reference.is_next() && self.experience.is_last_step(current) {
            return self.end_experience(true, false);
        }

        let Some(next) = reference.resolve(&self.experience, current) else {
            return step_not_found(&self.experience, current, reference);
        };

        let same_container =
            self.experience.container_index_of(next) == self.experience.container_index_of(current);
        let action = Action::StartStep(StepReference::Index(next));
        let mark_complete = next > current;

        if same_container {
            Transition::next(
                self.ending(mark_complete, None),
                Some(SideEffect::Continuation(action)),
            )
        } else {
            let (effect, resolver) = AwaitEffect::new(AwaitKind::Continuation, action);
            Transition::next(
                self.ending(mark_complete, Some(resolver)),
                Some(SideEffect::Await(effect)),
            )
        }
    }

    fn end_experience(&self, mark_complete: bool, destroyed: bool) -> Transition {
        let action = Action::EndExperience {
            mark_complete,
            destroyed,
        };

        if destroyed {
            // Nothing left on screen to wait for.
            Transition::next(
                self.ending(mark_complete, None),
                Some(SideEffect::Continuation(action)),
            )
        } else {
            let (effect, resolver) = AwaitEffect::new(AwaitKind::Dismiss, action);
            Transition::next(
                self.ending(mark_complete, Some(resolver)),
                Some(SideEffect::Await(effect)),
            )
        }
    }

    fn ending(&self, mark_complete: bool, await_effect: Option<AwaitResolver>) -> State {
        State::EndingStep(EndingStepState {
            experience: Arc::clone(&self.experience),
            flat_step_index: self.flat_step_index,
            mark_complete,
            await_effect,
        })
    }
}

impl EndingStepState {
    fn take(&self, current: &State, action: Action) -> Option<Transition> {
        match action {
            Action::StartExperience(_) => Some(already_active(&self.experience)),
            Action::StartStep(reference) => {
                let Some(next) = reference.resolve(&self.experience, self.flat_step_index) else {
                    return Some(step_not_found(
                        &self.experience,
                        self.flat_step_index,
                        reference,
                    ));
                };
                let different_container = self.experience.container_index_of(next)
                    != self.experience.container_index_of(self.flat_step_index);
                Some(Transition::next(
                    State::BeginningStep(BeginningStepState {
                        experience: Arc::clone(&self.experience),
                        flat_step_index: next,
                        is_first: false,
                    }),
                    Some(SideEffect::Presentation(PresentationEffect::new(
                        Arc::clone(&self.experience),
                        next,
                        different_container,
                    ))),
                ))
            }
            Action::EndExperience { mark_complete, .. } => Some(Transition::next(
                State::EndingExperience(EndingExperienceState {
                    experience: Arc::clone(&self.experience),
                    flat_step_index: self.flat_step_index,
                    mark_complete,
                }),
                Some(SideEffect::Continuation(Action::Reset)),
            )),
            Action::ReportError { retry_effect, .. } => Some(failing(current, retry_effect)),
            _ => None,
        }
    }
}

impl EndingExperienceState {
    fn take(&self, current: &State, action: Action) -> Option<Transition> {
        match action {
            Action::StartExperience(_) => Some(already_active(&self.experience)),
            Action::Reset => {
                let effect = (self.mark_complete && !self.experience.completion_actions.is_empty())
                    .then(|| SideEffect::ExperienceActions(self.experience.completion_actions.clone()));
                Some(Transition::next(State::Idling, effect))
            }
            Action::ReportError { retry_effect, .. } => Some(failing(current, retry_effect)),
            _ => None,
        }
    }
}

impl FailingState {
    fn take(&self, action: Action) -> Option<Transition> {
        match action {
            Action::Retry => Some(Transition::next(
                (*self.target).clone(),
                self.retry_effect.clone(),
            )),
            Action::StartExperience(experience) => Some(Transition::next(
                State::Idling,
                Some(SideEffect::Continuation(Action::StartExperience(experience))),
            )),
            Action::EndExperience { .. } => Some(Transition::next(State::Idling, None)),
            // A newer failure replaces the retry path but keeps the target.
            Action::ReportError { retry_effect, .. } => Some(Transition::next(
                State::Failing(FailingState {
                    target: self.target.clone(),
                    retry_effect: retry_effect.map(|effect| *effect),
                }),
                None,
            )),
            _ => None,
        }
    }
}
