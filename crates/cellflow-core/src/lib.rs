//! Cell execution engine for interactive documentation notebooks.
//!
//! This crate provides:
//! - A copy-on-write cell registry observable through a `watch` channel
//! - Prerequisite ordering with cycle detection
//! - Sequential, failure-contained execution of cells and their prerequisites
//! - Progress events for hosts rendering run state

pub mod config;
pub mod error;
pub mod execute;
pub mod graph;
pub mod state;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use execute::{
    CellEngine, CellFuture, CellOutcome, CellRunner, EngineEvent, RunOutcome, WeakCellEngine,
};
pub use graph::{Cell, CellId, CellStatus, MissingPrerequisite};
pub use state::Registry;
