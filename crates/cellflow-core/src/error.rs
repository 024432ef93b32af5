//! Error types for cellflow-core.

use std::time::Duration;

use thiserror::Error;

use crate::graph::CellId;

/// Result type for cellflow-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scheduling or running cells.
///
/// The scheduler never propagates these out of its entry points. They are
/// carried inside [`RunOutcome`](crate::execute::RunOutcome) so the host always
/// receives a result it can render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Cyclic dependency detected in the prerequisite graph.
    ///
    /// The path starts and ends with the same cell.
    #[error("cyclic dependency detected: {}", format_cycle(.0))]
    CyclicDependency(Vec<CellId>),

    /// A cell completed but reported failure.
    #[error("cell {cell_id} failed: {message}")]
    CellFailed { cell_id: CellId, message: String },

    /// A cell's run operation returned an error.
    #[error("{message}")]
    Execution { cell_id: CellId, message: String },

    /// A cell's run operation panicked.
    #[error("cell {cell_id} panicked: {message}")]
    Panicked { cell_id: CellId, message: String },

    /// A cell exceeded the configured execution timeout.
    #[error("cell {cell_id} timed out after {}ms", .after.as_millis())]
    Timeout { cell_id: CellId, after: Duration },

    /// Another run is already in flight.
    #[error("execution already in progress")]
    ExecutionInProgress,
}

impl Error {
    /// Build an execution error for use inside a cell's run operation.
    pub fn execution(cell_id: impl Into<CellId>, message: impl Into<String>) -> Self {
        Self::Execution {
            cell_id: cell_id.into(),
            message: message.into(),
        }
    }

    /// The cell this error is attributed to, if any.
    pub fn cell_id(&self) -> Option<&CellId> {
        match self {
            Self::CellFailed { cell_id, .. }
            | Self::Execution { cell_id, .. }
            | Self::Panicked { cell_id, .. }
            | Self::Timeout { cell_id, .. } => Some(cell_id),
            Self::CyclicDependency(_) | Self::ExecutionInProgress => None,
        }
    }
}

fn format_cycle(path: &[CellId]) -> String {
    path.iter()
        .map(CellId::as_str)
        .collect::<Vec<_>>()
        .join(" → ")
}
