//! Types for the cell graph.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::execute::CellRunner;

/// Unique identifier for a cell.
///
/// Identities are opaque strings chosen by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&CellId> for CellId {
    fn from(id: &CellId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for CellId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for CellId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for CellId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Cell execution status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    /// Cell has not been executed.
    #[default]
    Idle,
    /// Cell is scheduled in the current run and waiting its turn.
    Pending,
    /// Cell is currently executing.
    Running,
    /// Cell completed successfully.
    Success,
    /// Cell failed with an error.
    Error,
}

impl CellStatus {
    /// Whether the cell is part of an in-flight run.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        };
        f.pad(label)
    }
}

/// A registered cell.
///
/// Records are immutable once published in a registry snapshot. Every
/// mutation produces a new record so observers can detect changes with
/// [`Arc::ptr_eq`].
#[derive(Clone)]
pub struct Cell {
    /// Unique identifier
    pub id: CellId,
    /// Current execution status
    pub status: CellStatus,
    /// Number of successful runs, maintained by the cell owner
    pub execution_count: u64,
    /// Cells that must run before this one, in tie-break order
    pub prerequisites: Vec<CellId>,
    /// Caller-supplied run operation
    pub(crate) runner: Arc<dyn CellRunner>,
}

impl Cell {
    pub(crate) fn new(id: CellId, prerequisites: Vec<CellId>, runner: Arc<dyn CellRunner>) -> Self {
        Self {
            id,
            status: CellStatus::Idle,
            execution_count: 0,
            prerequisites,
            runner,
        }
    }

    /// Whether the cell's last run succeeded.
    pub fn is_executed(&self) -> bool {
        self.status == CellStatus::Success
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("execution_count", &self.execution_count)
            .field("prerequisites", &self.prerequisites)
            .finish_non_exhaustive()
    }
}

/// A prerequisite edge whose target is not registered.
///
/// Produced when a cell is unregistered while other cells still list it, or
/// when a run is requested for an unknown cell (`dependent` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingPrerequisite {
    /// Cell that references the missing id.
    pub dependent: Option<CellId>,
    /// The id that could not be resolved.
    pub missing: CellId,
}

impl fmt::Display for MissingPrerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dependent {
            Some(dependent) => write!(
                f,
                "cell '{}' lists unknown prerequisite '{}'",
                dependent, self.missing
            ),
            None => write!(f, "cell '{}' is not registered", self.missing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_id_conversions() {
        let id = CellId::from("imports");
        assert_eq!(id.as_str(), "imports");
        assert_eq!(id, "imports");
        assert_eq!(id.to_string(), "imports");
        assert_eq!(CellId::new(String::from("imports")), id);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&CellStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let status: CellStatus = serde_json::from_str("\"success\"").unwrap();
        assert_eq!(status, CellStatus::Success);
    }

    #[test]
    fn test_status_activity() {
        assert!(CellStatus::Pending.is_active());
        assert!(CellStatus::Running.is_active());
        assert!(!CellStatus::Idle.is_active());
        assert!(!CellStatus::Error.is_active());
        assert_eq!(CellStatus::default(), CellStatus::Idle);
    }

    #[test]
    fn test_missing_prerequisite_display() {
        let dangling = MissingPrerequisite {
            dependent: Some("plot".into()),
            missing: "simulate".into(),
        };
        assert_eq!(
            dangling.to_string(),
            "cell 'plot' lists unknown prerequisite 'simulate'"
        );

        let unknown = MissingPrerequisite {
            dependent: None,
            missing: "ghost".into(),
        };
        assert_eq!(unknown.to_string(), "cell 'ghost' is not registered");
    }
}
