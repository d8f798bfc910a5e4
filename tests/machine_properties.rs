//! End-to-end behaviour of the state machine through its public API.

use async_trait::async_trait;
use experience_machine::builder::{ExperienceBuilder, StateMachineBuilder};
use experience_machine::core::{Action, ExperienceStateError, State, StateKind, StepReference};
use experience_machine::effects::{ActionProcessor, EffectEnv, SideEffect};
use experience_machine::model::{
    Experience, ExperienceAction, PresentingTrait, Step, StepContainer, TraitError,
};
use experience_machine::StateMachine;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct CountingPresenter {
    calls: AtomicUsize,
}

impl CountingPresenter {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PresentingTrait for CountingPresenter {
    async fn present(&self) -> Result<(), TraitError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Asks for `retryable` retries, then fails terminally while `failing` is set.
#[derive(Debug)]
struct FlakyPresenter {
    calls: AtomicUsize,
    retryable: usize,
    failing: AtomicBool,
}

impl FlakyPresenter {
    fn new(retryable: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            retryable,
            failing: AtomicBool::new(true),
        })
    }
}

#[async_trait]
impl PresentingTrait for FlakyPresenter {
    async fn present(&self) -> Result<(), TraitError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.retryable {
            return Err(TraitError::new("target not ready").retry_after(Duration::from_millis(2)));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TraitError::new("target missing").recoverable());
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Recorded {
    label: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl ExperienceAction for Recorded {
    fn name(&self) -> &str {
        self.label
    }

    async fn execute(&self) {
        tokio::time::sleep(Duration::from_millis(1)).await;
        self.log.lock().push(self.label);
    }
}

fn recorded(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn ExperienceAction> {
    Arc::new(Recorded {
        label,
        log: Arc::clone(log),
    })
}

fn container(steps: usize, presenter: &Arc<CountingPresenter>) -> StepContainer {
    StepContainer::new(
        (0..steps)
            .map(|_| Step::new(Arc::clone(presenter) as Arc<dyn PresentingTrait>))
            .collect(),
    )
}

fn machine() -> StateMachine {
    StateMachineBuilder::new().build().unwrap()
}

async fn wait_for(states: &mut broadcast::Receiver<State>, kind: StateKind) -> State {
    tokio::time::timeout(WAIT, async {
        loop {
            let state = states.recv().await.unwrap();
            if state.kind() == kind {
                return state;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {kind:?}"))
}

/// Start `experience` and consume `states` up to its first rendered step.
async fn start_rendering(
    machine: &StateMachine,
    states: &mut broadcast::Receiver<State>,
    experience: Arc<Experience>,
) -> State {
    machine.start_experience(experience).await.unwrap();
    wait_for(states, StateKind::RenderingStep).await
}

async fn wait_for_log(log: &Arc<Mutex<Vec<&'static str>>>, entries: usize) {
    tokio::time::timeout(WAIT, async {
        while log.lock().len() < entries {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn start_commits_three_states_in_order() {
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(2, &presenter))
        .container(container(1, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();

    machine.start_experience(experience).await.unwrap();

    let mut kinds = Vec::new();
    for _ in 0..3 {
        kinds.push(tokio::time::timeout(WAIT, states.recv()).await.unwrap().unwrap().kind());
    }
    assert_eq!(
        kinds,
        vec![
            StateKind::BeginningExperience,
            StateKind::BeginningStep,
            StateKind::RenderingStep
        ]
    );
    assert_eq!(machine.state().current_step_index(), Some(0));
    assert_eq!(presenter.calls(), 1);
}

#[tokio::test]
async fn empty_experiences_are_rejected_while_idle() {
    let presenter = Arc::new(CountingPresenter::default());
    let machine = machine();

    let no_containers = ExperienceBuilder::new("empty").build();
    let empty_first = ExperienceBuilder::new("hollow")
        .container(container(0, &presenter))
        .container(container(2, &presenter))
        .build();

    for experience in [no_containers, empty_first] {
        match machine.start_experience(experience).await {
            Err(ExperienceStateError::Experience { .. }) => {}
            other => panic!("Expected experience error, got {other:?}"),
        }
        assert!(machine.state().is_idle());
    }
    assert!(machine.history().is_empty());
}

#[tokio::test]
async fn upstream_error_blocks_start() {
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("broken")
        .container(container(1, &presenter))
        .error("unknown trait type")
        .build();

    match machine().start_experience(experience).await {
        Err(ExperienceStateError::Experience { message, .. }) => {
            assert!(message.contains("unknown trait type"));
        }
        other => panic!("Expected experience error, got {other:?}"),
    }
}

#[tokio::test]
async fn same_container_moves_do_not_present_again() {
    let first = Arc::new(CountingPresenter::default());
    let second = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(4, &first))
        .container(container(1, &second))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    machine
        .handle_action(Action::StartStep(StepReference::Index(2)))
        .await
        .unwrap();
    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(2));

    let ending = machine
        .handle_action(Action::StartStep(StepReference::Offset(1)))
        .await
        .unwrap();
    assert!(ending.await_resolver().is_none());
    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(3));
    assert_eq!(first.calls(), 1);

    // Crossing into the next container waits for the UI, then presents.
    let ending = machine
        .handle_action(Action::StartStep(StepReference::Offset(1)))
        .await
        .unwrap();
    assert_eq!(ending.kind(), StateKind::EndingStep);
    assert!(ending.await_resolver().unwrap().resolve());

    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(4));
    assert_eq!(second.calls(), 1);
    assert_eq!(first.calls(), 1);
}

#[tokio::test]
async fn next_on_last_step_completes_the_experience() {
    let presenter = Arc::new(CountingPresenter::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let experience = ExperienceBuilder::new("tour")
        .container(container(1, &presenter))
        .completion_action(recorded("completed", &log))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    let ending = machine
        .handle_action(Action::StartStep(StepReference::Offset(1)))
        .await
        .unwrap();
    match &ending {
        State::EndingStep(ending) => assert!(ending.mark_complete),
        other => panic!("Expected ending step, got {other:?}"),
    }
    ending.await_resolver().unwrap().resolve();

    match wait_for(&mut states, StateKind::EndingExperience).await {
        State::EndingExperience(ending) => assert!(ending.mark_complete),
        other => panic!("Expected ending experience, got {other:?}"),
    }
    wait_for(&mut states, StateKind::Idling).await;
    wait_for_log(&log, 1).await;
    assert_eq!(*log.lock(), vec!["completed"]);
}

#[tokio::test]
async fn incomplete_dismissal_skips_completion_actions() {
    let presenter = Arc::new(CountingPresenter::default());
    let log = Arc::new(Mutex::new(Vec::new()));
    let experience = ExperienceBuilder::new("tour")
        .container(container(2, &presenter))
        .completion_action(recorded("completed", &log))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    machine.end_experience(false, true).await.unwrap();
    wait_for(&mut states, StateKind::Idling).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn destroyed_end_needs_no_resolution() {
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(2, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    let ending = machine.end_experience(false, true).await.unwrap();
    assert!(ending.await_resolver().is_none());

    wait_for(&mut states, StateKind::EndingExperience).await;
    wait_for(&mut states, StateKind::Idling).await;
}

#[tokio::test]
async fn dismissal_waits_for_the_ui() {
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(2, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    let ending = machine.end_experience(false, false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(machine.state().kind(), StateKind::EndingStep);

    ending.await_resolver().unwrap().resolve();
    wait_for(&mut states, StateKind::EndingExperience).await;
    wait_for(&mut states, StateKind::Idling).await;
}

#[tokio::test]
async fn second_experience_is_refused_while_active() {
    let presenter = Arc::new(CountingPresenter::default());
    let active = ExperienceBuilder::new("active")
        .container(container(2, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, Arc::clone(&active)).await;

    let other = ExperienceBuilder::new("other")
        .container(container(1, &presenter))
        .build();
    match machine.start_experience(other).await {
        Err(ExperienceStateError::ExperienceAlreadyActive { experience }) => {
            assert_eq!(experience.id, active.id);
        }
        other => panic!("Expected ExperienceAlreadyActive, got {other:?}"),
    }
    assert_eq!(machine.state().kind(), StateKind::RenderingStep);
    assert_eq!(
        machine.state().current_experience().map(|e| e.id),
        Some(active.id)
    );
}

#[tokio::test]
async fn concurrent_starts_admit_exactly_one() {
    let presenter = Arc::new(CountingPresenter::default());
    let machine = machine();

    let mut handles = Vec::new();
    for i in 0..8 {
        let machine = machine.clone();
        let experience = ExperienceBuilder::new(format!("racer {i}"))
            .container(container(1, &presenter))
            .build();
        handles.push(tokio::spawn(async move {
            machine.start_experience(experience).await
        }));
    }

    let mut started = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(state) => {
                assert_eq!(state.kind(), StateKind::BeginningExperience);
                started += 1;
            }
            Err(ExperienceStateError::ExperienceAlreadyActive { .. }) => refused += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(started, 1);
    assert_eq!(refused, 7);
}

#[tokio::test]
async fn resolving_twice_is_harmless() {
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(1, &presenter))
        .container(container(1, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    let ending = machine
        .handle_action(Action::StartStep(StepReference::Offset(1)))
        .await
        .unwrap();
    let resolver = ending.await_resolver().cloned().unwrap();

    assert!(resolver.resolve());
    assert!(!resolver.resolve());

    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(1));
    assert!(!resolver.resolve());
    assert_eq!(presenter.calls(), 2);
}

#[tokio::test]
async fn processor_keeps_fifo_across_effects() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let env = EffectEnv {
        processor: ActionProcessor::new(),
        max_presentation_retries: None,
    };
    let first = SideEffect::ExperienceActions(vec![recorded("a1", &log), recorded("a2", &log)]);
    let second = SideEffect::ExperienceActions(vec![recorded("b1", &log), recorded("b2", &log)]);

    assert!(first.launch(&env).await.is_none());
    assert!(second.launch(&env).await.is_none());

    wait_for_log(&log, 4).await;
    assert_eq!(*log.lock(), vec!["a1", "a2", "b1", "b2"]);
}

#[tokio::test]
async fn retries_then_reports_once() {
    let presenter = FlakyPresenter::new(3);
    let experience = ExperienceBuilder::new("flaky")
        .container(StepContainer::new(vec![Step::new(presenter.clone())]))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    let mut errors = machine.subscribe_errors();

    machine.start_experience(experience).await.unwrap();
    let failing = wait_for(&mut states, StateKind::Failing).await;

    assert_eq!(presenter.calls.load(Ordering::SeqCst), 4);
    assert_eq!(failing.current_step_index(), Some(0));

    let error = tokio::time::timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert!(error.is_recoverable());
    assert!(matches!(
        errors.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn retry_resumes_after_recovery() {
    let presenter = FlakyPresenter::new(0);
    let experience = ExperienceBuilder::new("recovering")
        .container(StepContainer::new(vec![Step::new(presenter.clone())]))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();

    machine.start_experience(experience).await.unwrap();
    wait_for(&mut states, StateKind::Failing).await;

    presenter.failing.store(false, Ordering::SeqCst);
    let resumed = machine.handle_action(Action::Retry).await.unwrap();
    assert_eq!(resumed.kind(), StateKind::BeginningStep);

    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(0));
}

#[tokio::test]
async fn failing_machine_accepts_a_new_experience() {
    let flaky = FlakyPresenter::new(0);
    let broken = ExperienceBuilder::new("broken")
        .container(StepContainer::new(vec![Step::new(flaky)]))
        .build();
    let presenter = Arc::new(CountingPresenter::default());
    let replacement = ExperienceBuilder::new("replacement")
        .container(container(1, &presenter))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();

    machine.start_experience(broken).await.unwrap();
    wait_for(&mut states, StateKind::Failing).await;

    let abandoned = machine
        .start_experience(Arc::clone(&replacement))
        .await
        .unwrap();
    assert!(abandoned.is_idle());

    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(
        rendering.current_experience().map(|e| e.id),
        Some(replacement.id)
    );
}

#[tokio::test]
async fn failing_machine_ends_without_ui() {
    let broken = ExperienceBuilder::new("broken")
        .container(StepContainer::new(vec![Step::new(FlakyPresenter::new(0))]))
        .build();
    let machine = machine();
    let mut states = machine.subscribe();

    machine.start_experience(broken).await.unwrap();
    wait_for(&mut states, StateKind::Failing).await;

    let ended = machine.end_experience(false, false).await.unwrap();
    assert!(ended.is_idle());
}

#[derive(Debug)]
struct LoggingPresenter(Arc<Mutex<Vec<&'static str>>>);

#[async_trait]
impl PresentingTrait for LoggingPresenter {
    async fn present(&self) -> Result<(), TraitError> {
        self.0.lock().push("presented");
        Ok(())
    }
}

#[tokio::test]
async fn container_navigation_completes_before_it_is_presented() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let presenter = Arc::new(CountingPresenter::default());
    let experience = ExperienceBuilder::new("tour")
        .container(container(1, &presenter))
        .container(
            StepContainer::new(vec![Step::new(Arc::new(LoggingPresenter(Arc::clone(&log))))])
                .with_navigation(recorded("navigated", &log)),
        )
        .build();
    let machine = machine();
    let mut states = machine.subscribe();
    start_rendering(&machine, &mut states, experience).await;

    let ending = machine
        .handle_action(Action::StartStep(StepReference::Offset(1)))
        .await
        .unwrap();
    ending.await_resolver().unwrap().resolve();

    let rendering = wait_for(&mut states, StateKind::RenderingStep).await;
    assert_eq!(rendering.current_step_index(), Some(1));
    assert_eq!(*log.lock(), vec!["navigated", "presented"]);
}
