//! Deferred work returned by a transition.

use super::await_effect::AwaitEffect;
use super::presentation::PresentationEffect;
use super::processor::ActionProcessor;
use crate::core::Action;
use crate::model::ExperienceAction;
use std::sync::Arc;

/// Everything a side effect may need while it runs.
#[derive(Clone, Debug)]
pub struct EffectEnv {
    pub processor: ActionProcessor,
    /// `None` retries for as long as the failure asks.
    pub max_presentation_retries: Option<usize>,
}

#[derive(Clone, Debug)]
pub enum SideEffect {
    /// Yields a fixed follow-up immediately.
    Continuation(Action),
    Presentation(PresentationEffect),
    /// Waits for the UI, then yields its follow-up.
    Await(AwaitEffect),
    /// Hands actions to the processor and yields nothing.
    ExperienceActions(Vec<Arc<dyn ExperienceAction>>),
}

impl SideEffect {
    pub async fn launch(&self, env: &EffectEnv) -> Option<Action> {
        match self {
            Self::Continuation(action) => Some(action.clone()),
            Self::Presentation(effect) => effect.launch(env).await,
            Self::Await(effect) => effect.launch().await,
            Self::ExperienceActions(actions) => {
                env.processor.process(actions.clone());
                None
            }
        }
    }

    /// Whether the machine must finish this effect before taking the next
    /// external action. Awaits depend on the UI and never block callers.
    pub fn is_chained(&self) -> bool {
        !matches!(self, Self::Await(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Continuation(_) => "Continuation",
            Self::Presentation(_) => "Presentation",
            Self::Await(_) => "Await",
            Self::ExperienceActions(_) => "ExperienceActions",
        }
    }
}
