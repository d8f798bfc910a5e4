//! Capabilities a step carries: presenting its container, producing
//! metadata for the renderer, and the opaque experience actions run by
//! the action processor.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;
use thiserror::Error;

/// Failure raised by a presenting or metadata-setting capability.
///
/// A failure that carries `retry_after` asks the presentation effect to
/// wait and try again. Once a failure stops asking for a retry it becomes
/// terminal and is reported as a step error.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message}")]
pub struct TraitError {
    pub message: String,
    pub retry_after: Option<Duration>,
    pub recoverable: bool,
}

impl TraitError {
    /// Create a terminal, non-recoverable failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
            recoverable: false,
        }
    }

    /// Ask for another attempt after `delay`.
    pub fn retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// Mark the failure as eligible for an explicit `Retry`.
    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }
}

/// Shows the UI of a step container.
///
/// Implementations run while the machine is finishing a transition chain,
/// so they must not call back into the state machine.
#[async_trait]
pub trait PresentingTrait: Send + Sync + Debug {
    async fn present(&self) -> Result<(), TraitError>;
}

/// Produces key/value metadata consumed by the renderer for a step.
pub trait MetadataSettingTrait: Send + Sync + Debug {
    fn produce_metadata(&self) -> Result<HashMap<String, Value>, TraitError>;
}

/// A user-visible operation (close, link, track, ...) executed by the
/// action processor.
///
/// Error handling belongs to the action itself; the processor never
/// retries or skips.
#[async_trait]
pub trait ExperienceAction: Send + Sync + Debug {
    fn name(&self) -> &str;

    async fn execute(&self);
}
