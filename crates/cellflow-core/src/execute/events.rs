//! Progress events broadcast while a run is in flight.

use serde::{Deserialize, Serialize};

use crate::graph::CellId;

/// Capacity for the event broadcast channel.
/// Slow subscribers lose the oldest events rather than stalling a run.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Event emitted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A run was planned; every listed cell is now pending.
    RunStarted {
        /// Cells selected for execution, in order.
        cells: Vec<CellId>,
    },

    /// A cell started running.
    CellStarted {
        /// Cell identifier.
        cell_id: CellId,
    },

    /// A cell completed successfully.
    CellCompleted {
        /// Cell identifier.
        cell_id: CellId,
        /// Wall-clock time spent in the cell's run operation.
        duration_ms: u64,
    },

    /// A cell failed, aborting the run.
    CellError {
        /// Cell identifier.
        cell_id: CellId,
        /// Error message.
        error: String,
    },

    /// A run ended, successfully or not.
    RunFinished {
        /// Whether every selected cell succeeded.
        success: bool,
        /// Cells that completed successfully, in order.
        executed: Vec<CellId>,
        /// Total run time.
        duration_ms: u64,
    },
}
