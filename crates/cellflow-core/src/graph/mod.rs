//! Cell graph.
//!
//! This module provides:
//! - Cell identity, status and record types
//! - Topological ordering from prerequisite edges
//! - Cycle detection with the offending path

mod order;
mod types;

pub use order::{Resolution, find_cycle, resolve_order};
pub use types::{Cell, CellId, CellStatus, MissingPrerequisite};
