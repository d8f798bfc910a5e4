//! Machine configuration.

use crate::builder::BuildError;
use crate::core::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

/// Default capacity of the state and error broadcast channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Tunables for a state machine. Deserializable so hosts can ship it
/// alongside their own settings; missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Buffered states/errors per subscriber before it starts lagging.
    pub channel_capacity: usize,
    /// Committed transitions kept in the machine's history.
    pub history_limit: usize,
    /// Cap on automatic presentation retries; `None` follows the failure's
    /// own retry requests indefinitely.
    pub max_presentation_retries: Option<usize>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_presentation_retries: None,
        }
    }
}

impl MachineConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.channel_capacity == 0 {
            return Err(BuildError::ZeroChannelCapacity);
        }
        Ok(())
    }
}
