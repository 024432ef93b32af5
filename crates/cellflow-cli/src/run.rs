//! Run command implementation for the cellflow CLI.
//!
//! Registers the plan's cells and runs either one target (with its
//! prerequisites) or every cell, printing progress as events arrive.

use std::time::Instant;

use cellflow_core::{CellEngine, CellStatus, EngineEvent, RunOutcome};
use tokio::sync::broadcast;

use crate::colors;
use crate::plan::Plan;

/// Execute a plan.
pub async fn execute(
    plan_path: &str,
    cell: Option<&str>,
    force: bool,
    timeout_ms: Option<u64>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let plan = Plan::load(plan_path)?;

    println!(
        "\n{}Running{} {} {}({} cells){}",
        colors::BOLD,
        colors::RESET,
        plan_path,
        colors::DIM,
        plan.cells.len(),
        colors::RESET
    );

    if plan.cells.is_empty() {
        println!("\n{}No cells found in plan.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    let engine = CellEngine::with_config(plan.engine_config(timeout_ms));
    plan.register(&engine);

    let events = engine.subscribe_events();
    let printer = tokio::spawn(print_progress(events));

    let outcome = match cell {
        Some(target) => engine.run_with_prerequisites(target, force).await,
        None => engine.run_all().await,
    };

    // A run that never started (cycle, unknown target) emits no events.
    if outcome.executed_cells.is_empty() && outcome.failed_cell().is_none() {
        printer.abort();
    } else {
        printer.await.ok();
    }

    print_summary(&engine, &outcome);

    let total_time = start.elapsed();
    println!("\n{}", "─".repeat(50));

    if outcome.success {
        println!(
            "{}Completed{} {} cells in {:.2}s",
            colors::GREEN,
            colors::RESET,
            outcome.executed_cells.len(),
            total_time.as_secs_f64()
        );
        Ok(())
    } else {
        let message = outcome.error.unwrap_or_else(|| "run failed".to_string());
        anyhow::bail!(
            "{} after {} of the selected cells",
            message,
            outcome.executed_cells.len()
        )
    }
}

/// Print one line per cell as the run progresses, until the run finishes.
async fn print_progress(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!("Progress output skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            EngineEvent::RunStarted { cells } => {
                println!(
                    "{}Planned:{} {}",
                    colors::DIM,
                    colors::RESET,
                    cells
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(" → ")
                );
            }
            EngineEvent::CellStarted { cell_id } => {
                print!(
                    "{}  ▶ Running{} {}{}{}... ",
                    colors::CYAN,
                    colors::RESET,
                    colors::BOLD,
                    cell_id,
                    colors::RESET
                );
                colors::flush_stdout();
            }
            EngineEvent::CellCompleted { duration_ms, .. } => {
                println!(
                    "{}✓{} {}{}ms{}",
                    colors::GREEN,
                    colors::RESET,
                    colors::DIM,
                    duration_ms,
                    colors::RESET
                );
            }
            EngineEvent::CellError { error, .. } => {
                println!("{}✗{}", colors::RED, colors::RESET);
                eprintln!("{}    Error:{} {}", colors::RED, colors::RESET, error);
            }
            EngineEvent::RunFinished { .. } => break,
        }
    }
}

/// Print the final status of every registered cell.
fn print_summary(engine: &CellEngine, outcome: &RunOutcome) {
    for missing in &outcome.missing_prerequisites {
        println!("{}warning:{} {}", colors::YELLOW, colors::RESET, missing);
    }

    println!("\n{}Cells:{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));

    for cell in engine.snapshot().cells() {
        let color = match cell.status {
            CellStatus::Success => colors::GREEN,
            CellStatus::Error => colors::RED,
            CellStatus::Pending | CellStatus::Running => colors::YELLOW,
            CellStatus::Idle => colors::DIM,
        };
        println!(
            "  {:<24} {}{:<8}{} runs: {}",
            cell.id.as_str(),
            color,
            cell.status,
            colors::RESET,
            cell.execution_count
        );
    }
}
