//! Presenting a step: navigate to its container, produce its metadata,
//! show the container, retry while the failure asks for it.

use super::processor::ActionProcessor;
use super::side_effect::{EffectEnv, SideEffect};
use crate::core::{Action, ExperienceStateError};
use crate::model::{Experience, StepMetadata, TraitError};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct PresentationEffect {
    experience: Arc<Experience>,
    flat_step_index: usize,
    should_present: bool,
    is_recovering: bool,
}

impl PresentationEffect {
    pub fn new(experience: Arc<Experience>, flat_step_index: usize, should_present: bool) -> Self {
        Self {
            experience,
            flat_step_index,
            should_present,
            is_recovering: false,
        }
    }

    pub fn flat_step_index(&self) -> usize {
        self.flat_step_index
    }

    pub fn should_present(&self) -> bool {
        self.should_present
    }

    pub fn is_recovering(&self) -> bool {
        self.is_recovering
    }

    /// The same presentation, flagged as a recovery attempt.
    pub fn recovering(&self) -> Self {
        Self {
            is_recovering: true,
            ..self.clone()
        }
    }

    /// Resolves to `RenderStep` on success, or `ReportError` carrying this
    /// effect (as a recovery) once the failure stops asking for retries.
    pub async fn launch(&self, env: &EffectEnv) -> Option<Action> {
        if self.should_present && !self.is_recovering {
            self.navigate().await;
        }

        let mut retries = 0usize;
        loop {
            match self.present().await {
                Ok(metadata) => {
                    if self.is_recovering {
                        info!(
                            experience = %self.experience.id,
                            step = self.flat_step_index,
                            "step recovered"
                        );
                    }
                    return Some(Action::RenderStep(metadata));
                }
                Err(error) => {
                    let within_limit = env
                        .max_presentation_retries
                        .map_or(true, |max| retries < max);
                    match error.retry_after {
                        Some(delay) if within_limit => {
                            retries += 1;
                            warn!(
                                experience = %self.experience.id,
                                step = self.flat_step_index,
                                attempt = retries,
                                delay_ms = delay.as_millis() as u64,
                                error = %error,
                                "presentation failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ => return Some(self.report(error)),
                    }
                }
            }
        }
    }

    /// Run the container's navigation actions to completion.
    ///
    /// They get a processor of their own: the shared queue may hold actions
    /// that call back into the machine, which is busy with this chain.
    async fn navigate(&self) {
        let Some(container) = self.experience.container_of(self.flat_step_index) else {
            return;
        };
        if container.actions.is_empty() {
            return;
        }

        debug!(
            experience = %self.experience.id,
            container = %container.id,
            actions = container.actions.len(),
            "running navigation actions"
        );
        let navigation = ActionProcessor::new();
        if navigation.submit(container.actions.clone()).await.is_err() {
            warn!(experience = %self.experience.id, "navigation ended without finishing");
        }
    }

    async fn present(&self) -> Result<StepMetadata, TraitError> {
        let step = self.experience.step(self.flat_step_index).ok_or_else(|| {
            TraitError::new(format!("step {} does not exist", self.flat_step_index))
        })?;

        let mut metadata = StepMetadata::default();
        for producer in &step.metadata_traits {
            metadata.extend(producer.produce_metadata()?);
        }

        if self.should_present {
            debug!(experience = %self.experience.id, step = self.flat_step_index, "presenting step container");
            step.presenter.present().await?;
        }

        Ok(metadata)
    }

    fn report(&self, error: TraitError) -> Action {
        Action::ReportError {
            error: ExperienceStateError::Step {
                experience: Arc::clone(&self.experience),
                step_index: self.flat_step_index,
                message: error.message,
                recoverable: error.recoverable,
            },
            retry_effect: Some(Box::new(SideEffect::Presentation(self.recovering()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ExperienceBuilder;
    use crate::effects::ActionProcessor;
    use crate::model::{ExperienceAction, MetadataSettingTrait, PresentingTrait, Step, StepContainer};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use parking_lot::Mutex;

    /// Fails with a retry request `retryable` times, then `then` forever.
    #[derive(Debug)]
    struct Flaky {
        calls: AtomicUsize,
        retryable: usize,
        then: Option<TraitError>,
    }

    impl Flaky {
        fn new(retryable: usize, then: Option<TraitError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                retryable,
                then,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PresentingTrait for Flaky {
        async fn present(&self) -> Result<(), TraitError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.retryable {
                return Err(TraitError::new("not ready").retry_after(Duration::from_millis(1)));
            }
            match &self.then {
                Some(error) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    #[derive(Debug)]
    struct Theme;

    impl MetadataSettingTrait for Theme {
        fn produce_metadata(&self) -> Result<HashMap<String, Value>, TraitError> {
            Ok(HashMap::from([("theme".to_string(), Value::from("dark"))]))
        }
    }

    type Log = Arc<Mutex<Vec<&'static str>>>;

    /// Slow navigation, so a presenter that does not wait would log first.
    #[derive(Debug)]
    struct Navigate(Log);

    #[async_trait]
    impl ExperienceAction for Navigate {
        fn name(&self) -> &str {
            "navigate"
        }

        async fn execute(&self) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.0.lock().push("navigated");
        }
    }

    #[derive(Debug)]
    struct Logged(Log);

    #[async_trait]
    impl PresentingTrait for Logged {
        async fn present(&self) -> Result<(), TraitError> {
            self.0.lock().push("presented");
            Ok(())
        }
    }

    fn navigating(log: &Log) -> Arc<Experience> {
        ExperienceBuilder::new("navigation")
            .container(
                StepContainer::new(vec![Step::new(Arc::new(Logged(Arc::clone(log))))])
                    .with_navigation(Arc::new(Navigate(Arc::clone(log)))),
            )
            .build()
    }

    #[derive(Debug)]
    struct Stuck;

    #[async_trait]
    impl ExperienceAction for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn execute(&self) {
            std::future::pending::<()>().await;
        }
    }

    fn env(max_presentation_retries: Option<usize>) -> EffectEnv {
        EffectEnv {
            processor: ActionProcessor::new(),
            max_presentation_retries,
        }
    }

    fn single_step(presenter: Arc<Flaky>) -> Arc<Experience> {
        ExperienceBuilder::new("presentation")
            .container(StepContainer::new(vec![
                Step::new(presenter).with_metadata(Arc::new(Theme))
            ]))
            .build()
    }

    #[tokio::test]
    async fn success_renders_with_metadata() {
        let presenter = Flaky::new(0, None);
        let effect = PresentationEffect::new(single_step(presenter.clone()), 0, true);

        match effect.launch(&env(None)).await {
            Some(Action::RenderStep(metadata)) => {
                assert_eq!(metadata.get("theme"), Some(&Value::from("dark")));
            }
            other => panic!("Expected RenderStep, got {other:?}"),
        }
        assert_eq!(presenter.calls(), 1);
    }

    #[tokio::test]
    async fn skips_presenting_when_not_asked() {
        let presenter = Flaky::new(0, None);
        let effect = PresentationEffect::new(single_step(presenter.clone()), 0, false);

        assert!(matches!(
            effect.launch(&env(None)).await,
            Some(Action::RenderStep(_))
        ));
        assert_eq!(presenter.calls(), 0);
    }

    #[tokio::test]
    async fn retries_until_failure_stops_asking() {
        let presenter = Flaky::new(3, Some(TraitError::new("gone").recoverable()));
        let effect = PresentationEffect::new(single_step(presenter.clone()), 0, true);

        match effect.launch(&env(None)).await {
            Some(Action::ReportError {
                error,
                retry_effect: Some(retry),
            }) => {
                assert!(error.is_recoverable());
                assert!(matches!(*retry, SideEffect::Presentation(ref p) if p.is_recovering()));
            }
            other => panic!("Expected ReportError, got {other:?}"),
        }
        assert_eq!(presenter.calls(), 4);
    }

    #[tokio::test]
    async fn retry_limit_turns_failure_terminal() {
        let presenter = Flaky::new(10, None);
        let effect = PresentationEffect::new(single_step(presenter.clone()), 0, true);

        assert!(matches!(
            effect.launch(&env(Some(2))).await,
            Some(Action::ReportError { .. })
        ));
        assert_eq!(presenter.calls(), 3);
    }

    #[tokio::test]
    async fn navigation_finishes_before_presenting() {
        let log = Log::default();
        let effect = PresentationEffect::new(navigating(&log), 0, true);

        assert!(matches!(
            effect.launch(&env(None)).await,
            Some(Action::RenderStep(_))
        ));
        assert_eq!(*log.lock(), vec!["navigated", "presented"]);
    }

    #[tokio::test]
    async fn navigation_waits_only_for_its_own_actions() {
        let log = Log::default();
        let env = env(None);
        // Something on the shared queue that never finishes.
        env.processor.process(vec![Arc::new(Stuck)]);

        let effect = PresentationEffect::new(navigating(&log), 0, true);
        let rendered = tokio::time::timeout(Duration::from_secs(2), effect.launch(&env)).await;

        assert!(matches!(rendered, Ok(Some(Action::RenderStep(_)))));
        assert_eq!(*log.lock(), vec!["navigated", "presented"]);
    }

    #[tokio::test]
    async fn recovery_skips_navigation() {
        let log = Log::default();
        let effect = PresentationEffect::new(navigating(&log), 0, true).recovering();

        effect.launch(&env(None)).await;

        assert_eq!(*log.lock(), vec!["presented"]);
    }
}
