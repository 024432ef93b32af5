//! Dependency-aware scheduler for notebook cells.
//!
//! Runs cells one at a time in prerequisite order. Cell bookkeeping lives in a
//! [`Registry`] published through a `watch` channel; no lock is held while a
//! cell's run operation is awaited, so run operations may call back into the
//! registry mutators.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{Mutex, broadcast, watch};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::graph::{Cell, CellId, CellStatus, MissingPrerequisite, find_cycle, resolve_order};
use crate::state::Registry;

use super::context::{CellOutcome, CellRunner};
use super::events::EngineEvent;
use super::outcome::RunOutcome;

/// Cells selected for a run, in execution order.
struct RunPlan {
    cells: Vec<CellId>,
    missing: Vec<MissingPrerequisite>,
}

struct EngineInner {
    /// Current registry snapshot; every mutation republishes it.
    state: watch::Sender<Registry>,
    /// Progress events for observers.
    events: broadcast::Sender<EngineEvent>,
    /// Held for the duration of a run. Overlapping runs are rejected.
    run_lock: Mutex<()>,
    config: EngineConfig,
}

/// Cell registry and scheduler.
///
/// Cheap to clone; clones share the same registry. The registry owns every
/// cell's run operation, so a run operation that needs to update its own cell
/// (for example [`increment_execution_count`](Self::increment_execution_count))
/// should capture a [`WeakCellEngine`] from [`downgrade`](Self::downgrade).
/// Capturing a strong clone keeps the engine alive until [`reset`](Self::reset).
#[derive(Clone)]
pub struct CellEngine {
    inner: Arc<EngineInner>,
}

/// Non-owning handle to a [`CellEngine`].
///
/// Mutators are no-ops once every strong handle has been dropped.
#[derive(Clone, Default)]
pub struct WeakCellEngine {
    inner: Weak<EngineInner>,
}

impl WeakCellEngine {
    /// Get a strong handle if the engine is still alive.
    pub fn upgrade(&self) -> Option<CellEngine> {
        self.inner.upgrade().map(|inner| CellEngine { inner })
    }

    pub fn set_status(&self, id: &str, status: CellStatus) {
        if let Some(engine) = self.upgrade() {
            engine.set_status(id, status);
        }
    }

    pub fn increment_execution_count(&self, id: &str) {
        if let Some(engine) = self.upgrade() {
            engine.increment_execution_count(id);
        }
    }

    /// Remove a cell. Returns `false` if it was not registered or the engine
    /// is gone.
    pub fn unregister(&self, id: &str) -> bool {
        self.upgrade().is_some_and(|engine| engine.unregister(id))
    }

    pub fn get_cell(&self, id: &str) -> Option<Arc<Cell>> {
        self.upgrade().and_then(|engine| engine.get_cell(id))
    }
}

impl CellEngine {
    /// Create an engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        let (state, _) = watch::channel(Registry::new());
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(EngineInner {
                state,
                events,
                run_lock: Mutex::new(()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a non-owning handle for use inside run operations.
    pub fn downgrade(&self) -> WeakCellEngine {
        WeakCellEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to registry snapshots.
    ///
    /// The receiver is notified after every mutation. Unchanged cells keep
    /// the same `Arc` across snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Registry> {
        self.inner.state.subscribe()
    }

    /// Subscribe to run progress events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    /// Clone the current registry snapshot.
    pub fn snapshot(&self) -> Registry {
        self.inner.state.borrow().clone()
    }

    /// Register a cell, replacing any existing cell with the same ID.
    ///
    /// The cell starts `idle` with an execution count of zero.
    pub fn register<F, Fut>(&self, id: impl Into<CellId>, prerequisites: &[&str], run: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CellOutcome>> + Send + 'static,
    {
        self.register_runner(id, prerequisites, Arc::new(run));
    }

    /// Register a cell with a shared run operation.
    pub fn register_runner(
        &self,
        id: impl Into<CellId>,
        prerequisites: &[&str],
        runner: Arc<dyn CellRunner>,
    ) {
        let id = id.into();
        let prerequisites = prerequisites.iter().map(|&p| CellId::from(p)).collect();
        tracing::debug!("Registering cell '{}'", id);

        let cell = Cell::new(id, prerequisites, runner);
        self.inner.state.send_modify(|registry| registry.insert(cell));
    }

    /// Remove a cell. Returns `false` if it was not registered.
    ///
    /// Other cells that list it as a prerequisite are left untouched; the
    /// dangling reference is skipped and reported on the next run.
    pub fn unregister(&self, id: &str) -> bool {
        self.inner
            .state
            .send_if_modified(|registry| registry.remove(id).is_some())
    }

    /// Set a cell's status. No-op if the cell is not registered.
    pub fn set_status(&self, id: &str, status: CellStatus) {
        self.inner
            .state
            .send_if_modified(|registry| registry.update(id, |cell| cell.status = status));
    }

    /// Increment a cell's execution count. No-op if the cell is not registered.
    pub fn increment_execution_count(&self, id: &str) {
        self.inner.state.send_if_modified(|registry| {
            registry.update(id, |cell| cell.execution_count += 1)
        });
    }

    /// Get a cell by ID.
    pub fn get_cell(&self, id: &str) -> Option<Arc<Cell>> {
        self.inner.state.borrow().get(id).cloned()
    }

    /// Whether the cell's status is exactly `success`.
    pub fn is_executed(&self, id: &str) -> bool {
        self.inner
            .state
            .borrow()
            .get(id)
            .is_some_and(|cell| cell.is_executed())
    }

    /// Registered cell IDs in registration order.
    pub fn cell_ids(&self) -> Vec<CellId> {
        self.inner.state.borrow().ids().cloned().collect()
    }

    /// Get the number of registered cells.
    pub fn len(&self) -> usize {
        self.inner.state.borrow().len()
    }

    /// Check if no cells are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().is_empty()
    }

    /// Check if a run is in progress.
    pub fn is_running(&self) -> bool {
        self.inner.run_lock.try_lock().is_err()
    }

    /// Set every cell to `idle` with an execution count of zero.
    ///
    /// Registrations, prerequisites and run operations are kept.
    pub fn reset_all_cells(&self) {
        self.inner.state.send_if_modified(|registry| {
            registry.update_all(|cell| {
                cell.status = CellStatus::Idle;
                cell.execution_count = 0;
            })
        });
    }

    /// Drop every registration.
    pub fn reset(&self) {
        self.inner.state.send_if_modified(Registry::clear);
    }

    /// Run a cell after running whatever prerequisites it needs.
    ///
    /// Prerequisites that already succeeded are skipped unless
    /// `force_prerequisites` is set. The target itself always runs.
    pub async fn run_with_prerequisites(
        &self,
        target: &str,
        force_prerequisites: bool,
    ) -> RunOutcome {
        let start = Instant::now();
        let Ok(_guard) = self.inner.run_lock.try_lock() else {
            tracing::warn!(
                "Rejected run of '{}': execution already in progress",
                target
            );
            return rejected_outcome(start);
        };

        let target = CellId::from(target);
        let plan = {
            let registry = self.inner.state.borrow();

            if let Some(cycle) = find_cycle(&registry, [&target]) {
                return cycle_outcome(cycle, start);
            }

            let resolution = resolve_order(&registry, [&target]);
            let cells = resolution
                .order
                .into_iter()
                .filter(|id| {
                    force_prerequisites
                        || *id == target
                        || registry
                            .get(id.as_str())
                            .is_some_and(|cell| !cell.is_executed())
                })
                .collect();

            RunPlan {
                cells,
                missing: resolution.missing,
            }
        };

        self.execute_plan(plan, start).await
    }

    /// Run every registered cell in dependency order, regardless of status.
    pub async fn run_all(&self) -> RunOutcome {
        let start = Instant::now();
        let Ok(_guard) = self.inner.run_lock.try_lock() else {
            tracing::warn!("Rejected run of all cells: execution already in progress");
            return rejected_outcome(start);
        };

        let plan = {
            let registry = self.inner.state.borrow();
            let roots: Vec<CellId> = registry.ids().cloned().collect();

            if let Some(cycle) = find_cycle(&registry, &roots) {
                return cycle_outcome(cycle, start);
            }

            let resolution = resolve_order(&registry, &roots);
            RunPlan {
                cells: resolution.order,
                missing: resolution.missing,
            }
        };

        self.execute_plan(plan, start).await
    }

    /// Mark the plan pending, then run each cell in order until one fails.
    async fn execute_plan(&self, plan: RunPlan, start: Instant) -> RunOutcome {
        let RunPlan { cells, missing } = plan;
        if cells.is_empty() {
            return RunOutcome::succeeded(Vec::new(), missing, start.elapsed());
        }

        self.inner.state.send_modify(|registry| {
            for id in &cells {
                registry.update(id.as_str(), |cell| cell.status = CellStatus::Pending);
            }
        });
        self.emit(EngineEvent::RunStarted {
            cells: cells.clone(),
        });
        tracing::info!("Running {} cell(s)", cells.len());

        let mut run = ActiveRun::new(self, cells, start);

        for index in 0..run.cells.len() {
            let cell_id = run.cells[index].clone();
            let Some(runner) = self.begin_cell(&cell_id) else {
                tracing::warn!(
                    "Cell '{}' was unregistered before it could run, skipping",
                    cell_id
                );
                continue;
            };

            tracing::debug!("Running cell '{}'", cell_id);
            self.emit(EngineEvent::CellStarted {
                cell_id: cell_id.clone(),
            });

            let cell_start = Instant::now();
            let result = self.invoke(&cell_id, runner).await;

            match self.settle(&cell_id, result) {
                Ok(()) => {
                    run.executed.push(cell_id.clone());
                    self.emit(EngineEvent::CellCompleted {
                        cell_id,
                        duration_ms: millis(cell_start.elapsed()),
                    });
                }
                Err(failure) => {
                    self.release_cells(&run.cells);
                    let executed = run.finish();

                    let duration = start.elapsed();
                    tracing::warn!("Run aborted at cell '{}': {}", cell_id, failure);
                    self.emit(EngineEvent::CellError {
                        cell_id,
                        error: failure.to_string(),
                    });
                    self.emit(EngineEvent::RunFinished {
                        success: false,
                        executed: executed.clone(),
                        duration_ms: millis(duration),
                    });

                    return RunOutcome::failed(executed, failure, missing, duration);
                }
            }
        }

        let executed = run.finish();
        let duration = start.elapsed();
        tracing::info!(
            "Executed {} cell(s) in {:.2}s",
            executed.len(),
            duration.as_secs_f64()
        );
        self.emit(EngineEvent::RunFinished {
            success: true,
            executed: executed.clone(),
            duration_ms: millis(duration),
        });

        RunOutcome::succeeded(executed, missing, duration)
    }

    /// Mark a cell running and return its run operation.
    fn begin_cell(&self, id: &CellId) -> Option<Arc<dyn CellRunner>> {
        let mut runner = None;
        self.inner.state.send_if_modified(|registry| {
            registry.update(id.as_str(), |cell| {
                cell.status = CellStatus::Running;
                runner = Some(cell.runner.clone());
            })
        });
        runner
    }

    /// Await a cell's run operation, applying the panic and timeout policy.
    async fn invoke(&self, cell_id: &CellId, runner: Arc<dyn CellRunner>) -> Result<CellOutcome> {
        let config = &self.inner.config;

        let future = if config.catch_panics {
            match std::panic::catch_unwind(AssertUnwindSafe(|| runner.run())) {
                Ok(future) => {
                    let cell_id = cell_id.clone();
                    AssertUnwindSafe(future)
                        .catch_unwind()
                        .map(move |result| {
                            result.unwrap_or_else(|payload| Err(panicked(cell_id, payload)))
                        })
                        .boxed()
                }
                Err(payload) => return Err(panicked(cell_id.clone(), payload)),
            }
        } else {
            runner.run()
        };

        match config.cell_timeout {
            Some(after) => tokio::time::timeout(after, future)
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout {
                        cell_id: cell_id.clone(),
                        after,
                    })
                }),
            None => future.await,
        }
    }

    /// Record the result of a cell's run operation.
    ///
    /// A cell whose owner flagged `error` through the registry during the run
    /// counts as failed even if the operation itself reported success.
    fn settle(&self, cell_id: &CellId, result: Result<CellOutcome>) -> Result<()> {
        let failure = match result {
            Ok(CellOutcome::Success) => {
                let flagged = self
                    .inner
                    .state
                    .borrow()
                    .get(cell_id.as_str())
                    .is_some_and(|cell| cell.status == CellStatus::Error);

                if !flagged {
                    self.set_status(cell_id.as_str(), CellStatus::Success);
                    return Ok(());
                }
                Error::CellFailed {
                    cell_id: cell_id.clone(),
                    message: "run completed with error status".to_string(),
                }
            }
            Ok(CellOutcome::Failure(message)) => Error::CellFailed {
                cell_id: cell_id.clone(),
                message,
            },
            Err(err) => err,
        };

        self.set_status(cell_id.as_str(), CellStatus::Error);
        Err(failure)
    }

    /// Return the cells of a stopped run to a terminal state.
    ///
    /// Pending cells go back to `idle`. A cell still `running` (the run was
    /// dropped while awaiting it) is marked `error`.
    fn release_cells(&self, cells: &[CellId]) {
        self.inner.state.send_if_modified(|registry| {
            let mut changed = false;
            for id in cells {
                let released = match registry.get(id.as_str()).map(|cell| cell.status) {
                    Some(CellStatus::Pending) => CellStatus::Idle,
                    Some(CellStatus::Running) => CellStatus::Error,
                    _ => continue,
                };
                changed |= registry.update(id.as_str(), |cell| cell.status = released);
            }
            changed
        });
    }

    /// Broadcast an event, ignoring send failures.
    fn emit(&self, event: EngineEvent) {
        let _ = self.inner.events.send(event);
    }
}

impl Default for CellEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Cells of an in-flight run.
///
/// Dropped without [`finish`](Self::finish) when the run future is cancelled
/// or a panic unwinds through it; the cells are then released so none stays
/// `pending` or `running`.
struct ActiveRun<'a> {
    engine: &'a CellEngine,
    cells: Vec<CellId>,
    executed: Vec<CellId>,
    start: Instant,
    finished: bool,
}

impl<'a> ActiveRun<'a> {
    fn new(engine: &'a CellEngine, cells: Vec<CellId>, start: Instant) -> Self {
        Self {
            engine,
            executed: Vec::with_capacity(cells.len()),
            cells,
            start,
            finished: false,
        }
    }

    fn finish(&mut self) -> Vec<CellId> {
        self.finished = true;
        std::mem::take(&mut self.executed)
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        tracing::warn!(
            "Run interrupted after {} of {} cell(s)",
            self.executed.len(),
            self.cells.len()
        );
        self.engine.release_cells(&self.cells);
        self.engine.emit(EngineEvent::RunFinished {
            success: false,
            executed: std::mem::take(&mut self.executed),
            duration_ms: millis(self.start.elapsed()),
        });
    }
}

fn rejected_outcome(start: Instant) -> RunOutcome {
    RunOutcome::failed(
        Vec::new(),
        Error::ExecutionInProgress,
        Vec::new(),
        start.elapsed(),
    )
}

fn cycle_outcome(cycle: Vec<CellId>, start: Instant) -> RunOutcome {
    let failure = Error::CyclicDependency(cycle);
    tracing::warn!("{}", failure);
    RunOutcome::failed(Vec::new(), failure, Vec::new(), start.elapsed())
}

fn panicked(cell_id: CellId, payload: Box<dyn Any + Send>) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());

    tracing::error!("Cell '{}' panicked: {}", cell_id, message);
    Error::Panicked { cell_id, message }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
