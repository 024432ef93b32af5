//! Execution plans: JSON descriptions of simulated notebook cells.
//!
//! A plan stands in for a notebook whose cells run against an interpreter.
//! Each cell declares its prerequisites and how its run should end, so the
//! scheduler can be exercised headlessly.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use cellflow_core::{CellEngine, CellOutcome, EngineConfig, Error, WeakCellEngine};
use serde::Deserialize;

/// How a simulated cell's run ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// Completes successfully.
    #[default]
    Ok,
    /// Completes but reports failure.
    Fail,
    /// Raises an error.
    Error,
    /// Panics mid-run.
    Panic,
}

/// A simulated cell.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanCell {
    pub id: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub behavior: Behavior,
    /// Simulated run time
    #[serde(default)]
    pub delay_ms: u64,
    /// Message reported on failure
    #[serde(default)]
    pub message: Option<String>,
}

/// A plan file.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub cells: Vec<PlanCell>,
}

impl Plan {
    /// Load a plan from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan {}", path.display()))?;
        Self::parse(&source).with_context(|| format!("invalid plan {}", path.display()))
    }

    /// Parse a plan from JSON.
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        let plan: Plan = serde_json::from_str(source)?;

        let mut seen = std::collections::HashSet::new();
        for cell in &plan.cells {
            if !seen.insert(cell.id.as_str()) {
                anyhow::bail!("duplicate cell id '{}'", cell.id);
            }
        }

        Ok(plan)
    }

    /// Engine configuration for this plan. A CLI override wins over the file.
    pub fn engine_config(&self, timeout_override: Option<u64>) -> EngineConfig {
        let config = EngineConfig::default();
        match timeout_override.or(self.timeout_ms) {
            Some(ms) => config.with_cell_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }

    /// Register every cell with the engine.
    ///
    /// Successful cells bump their own execution count, as an interpreter
    /// host would.
    pub fn register(&self, engine: &CellEngine) {
        for cell in &self.cells {
            let prerequisites: Vec<&str> = cell.prerequisites.iter().map(String::as_str).collect();
            let owner = engine.downgrade();
            let planned = cell.clone();

            engine.register(cell.id.as_str(), &prerequisites, move || {
                let owner = owner.clone();
                let planned = planned.clone();
                async move { simulate(&owner, &planned).await }
            });
        }
    }
}

async fn simulate(
    owner: &WeakCellEngine,
    cell: &PlanCell,
) -> cellflow_core::Result<CellOutcome> {
    if cell.delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(cell.delay_ms)).await;
    }

    let message = || {
        cell.message
            .clone()
            .unwrap_or_else(|| format!("{} failed", cell.id))
    };

    match cell.behavior {
        Behavior::Ok => {
            owner.increment_execution_count(&cell.id);
            Ok(CellOutcome::Success)
        }
        Behavior::Fail => Ok(CellOutcome::Failure(message())),
        Behavior::Error => Err(Error::execution(cell.id.as_str(), message())),
        Behavior::Panic => panic!("{}", message()),
    }
}
