//! Result of a scheduling operation.

use std::time::Duration;

use crate::error::Error;
use crate::graph::{CellId, MissingPrerequisite};

/// Outcome of [`CellEngine::run_with_prerequisites`](super::CellEngine::run_with_prerequisites)
/// or [`CellEngine::run_all`](super::CellEngine::run_all).
///
/// Failures are reported here, never returned as `Err`, so the host always has
/// something to render. `executed_cells` shows how far the run got.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// Whether every selected cell completed successfully.
    pub success: bool,
    /// Cells that completed successfully, in execution order.
    pub executed_cells: Vec<CellId>,
    /// Human-readable failure message.
    pub error: Option<String>,
    /// Typed failure, when `success` is false.
    pub failure: Option<Error>,
    /// Dangling prerequisite references skipped during ordering.
    pub missing_prerequisites: Vec<MissingPrerequisite>,
    /// Wall-clock time for the whole run.
    pub duration: Duration,
}

impl RunOutcome {
    pub(crate) fn succeeded(
        executed_cells: Vec<CellId>,
        missing_prerequisites: Vec<MissingPrerequisite>,
        duration: Duration,
    ) -> Self {
        Self {
            success: true,
            executed_cells,
            error: None,
            failure: None,
            missing_prerequisites,
            duration,
        }
    }

    pub(crate) fn failed(
        executed_cells: Vec<CellId>,
        failure: Error,
        missing_prerequisites: Vec<MissingPrerequisite>,
        duration: Duration,
    ) -> Self {
        Self {
            success: false,
            executed_cells,
            error: Some(failure.to_string()),
            failure: Some(failure),
            missing_prerequisites,
            duration,
        }
    }

    /// The cell that aborted the run, if a cell was at fault.
    pub fn failed_cell(&self) -> Option<&CellId> {
        self.failure.as_ref().and_then(Error::cell_id)
    }

    /// The cycle that prevented the run, if any.
    pub fn cycle(&self) -> Option<&[CellId]> {
        match &self.failure {
            Some(Error::CyclicDependency(path)) => Some(path),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_carries_message() {
        let outcome = RunOutcome::failed(
            vec!["a".into()],
            Error::CellFailed {
                cell_id: "b".into(),
                message: "assertion failed".into(),
            },
            Vec::new(),
            Duration::ZERO,
        );

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("cell b failed: assertion failed"));
        assert_eq!(outcome.failed_cell().map(CellId::as_str), Some("b"));
        assert!(outcome.cycle().is_none());
    }

    #[test]
    fn test_cycle_accessor() {
        let path: Vec<CellId> = vec!["a".into(), "b".into(), "a".into()];
        let outcome = RunOutcome::failed(
            Vec::new(),
            Error::CyclicDependency(path.clone()),
            Vec::new(),
            Duration::ZERO,
        );

        assert_eq!(outcome.cycle(), Some(path.as_slice()));
        assert!(outcome.failed_cell().is_none());
    }
}
