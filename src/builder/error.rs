//! Build errors for state machine construction.

use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Channel capacity must be greater than zero")]
    ZeroChannelCapacity,

    #[error("No Tokio runtime is running. Build the state machine inside a runtime")]
    NoRuntime,
}
