//! State transition history tracking.
//!
//! Provides immutable, bounded tracking of committed transitions,
//! following functional programming principles.

use super::state::{State, StateKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Default number of transitions a machine remembers.
pub const DEFAULT_HISTORY_LIMIT: usize = 256;

/// Record of a single committed transition.
///
/// # Example
///
/// ```rust
/// use experience_machine::core::{StateKind, StateTransition};
/// use chrono::Utc;
///
/// let transition = StateTransition {
///     from: StateKind::Idling,
///     to: StateKind::BeginningExperience,
///     experience_id: None,
///     step_index: None,
///     timestamp: Utc::now(),
/// };
/// assert_eq!(transition.to, StateKind::BeginningExperience);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    /// The state being transitioned from
    pub from: StateKind,
    /// The state being transitioned to
    pub to: StateKind,
    /// Experience active after the transition
    pub experience_id: Option<Uuid>,
    /// Flat step index after the transition
    pub step_index: Option<usize>,
    /// When the transition was committed
    pub timestamp: DateTime<Utc>,
}

impl StateTransition {
    pub fn between(from: &State, to: &State) -> Self {
        Self {
            from: from.kind(),
            to: to.kind(),
            experience_id: to
                .current_experience()
                .or_else(|| from.current_experience())
                .map(|e| e.id),
            step_index: to.current_step_index(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered history of committed transitions, capped at `limit` entries.
///
/// History is immutable - the `record` method returns a new history
/// with the transition added, dropping the oldest entry when full.
///
/// # Example
///
/// ```rust
/// use experience_machine::core::{StateHistory, StateKind, StateTransition};
/// use chrono::Utc;
///
/// let history = StateHistory::new(8);
/// let history = history.record(StateTransition {
///     from: StateKind::Idling,
///     to: StateKind::BeginningExperience,
///     experience_id: None,
///     step_index: None,
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(history.get_path(), vec![StateKind::Idling, StateKind::BeginningExperience]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateHistory {
    transitions: Vec<StateTransition>,
    limit: usize,
}

impl Default for StateHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl StateHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            transitions: Vec::new(),
            limit,
        }
    }

    /// Record a transition, returning a new history.
    ///
    /// Does not mutate the existing history. A limit of zero keeps nothing.
    pub fn record(&self, transition: StateTransition) -> Self {
        let mut transitions = self.transitions.clone();
        transitions.push(transition);
        let overflow = transitions.len().saturating_sub(self.limit);
        transitions.drain(..overflow);
        Self {
            transitions,
            limit: self.limit,
        }
    }

    /// The states traversed: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<StateKind> {
        let mut path = Vec::new();
        if let Some(first) = self.transitions.first() {
            path.push(first.from);
        }
        path.extend(self.transitions.iter().map(|t| t.to));
        path
    }

    /// Time between the first and last recorded transition.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.transitions.first(), self.transitions.last()) {
            last.timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok()
        } else {
            None
        }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn last(&self) -> Option<&StateTransition> {
        self.transitions.last()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(from: StateKind, to: StateKind) -> StateTransition {
        StateTransition {
            from,
            to,
            experience_id: None,
            step_index: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_history_is_empty() {
        let history = StateHistory::default();
        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert_eq!(history.limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn record_does_not_mutate_original() {
        let history = StateHistory::new(4);
        let recorded = history.record(transition(StateKind::Idling, StateKind::BeginningExperience));

        assert_eq!(history.len(), 0);
        assert_eq!(recorded.len(), 1);
    }

    #[test]
    fn path_follows_transitions() {
        let history = StateHistory::new(4)
            .record(transition(StateKind::Idling, StateKind::BeginningExperience))
            .record(transition(StateKind::BeginningExperience, StateKind::BeginningStep));

        assert_eq!(
            history.get_path(),
            vec![
                StateKind::Idling,
                StateKind::BeginningExperience,
                StateKind::BeginningStep
            ]
        );
    }

    #[test]
    fn oldest_entries_fall_off() {
        let history = StateHistory::new(2)
            .record(transition(StateKind::Idling, StateKind::BeginningExperience))
            .record(transition(StateKind::BeginningExperience, StateKind::BeginningStep))
            .record(transition(StateKind::BeginningStep, StateKind::RenderingStep));

        assert_eq!(history.len(), 2);
        assert_eq!(history.transitions()[0].from, StateKind::BeginningExperience);
        assert_eq!(history.last().map(|t| t.to), Some(StateKind::RenderingStep));
    }

    #[test]
    fn zero_limit_keeps_nothing() {
        let history = StateHistory::new(0).record(transition(StateKind::Idling, StateKind::Failing));
        assert!(history.is_empty());
    }

    #[test]
    fn history_serializes() {
        let history = StateHistory::new(4).record(transition(StateKind::Idling, StateKind::Failing));
        let json = serde_json::to_string(&history).unwrap();
        let restored: StateHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.transitions(), history.transitions());
    }
}
