//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::config::MachineConfig;
use crate::effects::{ActionProcessor, StateMachine};

/// Builder for constructing state machines with a fluent API.
#[derive(Default)]
pub struct StateMachineBuilder {
    config: MachineConfig,
    processor: Option<ActionProcessor>,
}

impl StateMachineBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a loaded configuration.
    pub fn from_config(config: MachineConfig) -> Self {
        Self {
            config,
            processor: None,
        }
    }

    /// Share an existing processor, e.g. one per application rather than
    /// one per machine. A fresh processor is spawned otherwise.
    pub fn processor(mut self, processor: ActionProcessor) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn max_presentation_retries(mut self, max: usize) -> Self {
        self.config.max_presentation_retries = Some(max);
        self
    }

    /// Build and start the state machine in `Idling`.
    /// Returns an error if the configuration is invalid or no Tokio runtime
    /// is available.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        self.config.validate()?;
        tokio::runtime::Handle::try_current().map_err(|_| BuildError::NoRuntime)?;

        let processor = self.processor.unwrap_or_default();
        Ok(StateMachine::spawn(&self.config, processor))
    }
}
