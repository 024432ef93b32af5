//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::execute::DEFAULT_EVENT_CAPACITY;

/// Configuration for the cell engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum time a single cell may run before it is marked as failed.
    /// `None` waits indefinitely.
    pub cell_timeout: Option<Duration>,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,

    /// Convert panics inside run operations into cell failures
    pub catch_panics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            catch_panics: true,
        }
    }
}

impl EngineConfig {
    pub fn with_cell_timeout(mut self, timeout: Duration) -> Self {
        self.cell_timeout = Some(timeout);
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn with_catch_panics(mut self, catch_panics: bool) -> Self {
        self.catch_panics = catch_panics;
        self
    }
}
