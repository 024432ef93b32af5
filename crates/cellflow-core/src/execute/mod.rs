//! Execution engine for notebook cells.
//!
//! Runs cells sequentially in prerequisite order against a shared interpreter.
//!
//! # Architecture
//!
//! ```text
//! CellEngine
//!     │
//!     ├── watch::Sender<Registry>   (copy-on-write snapshots for the UI)
//!     ├── broadcast::Sender<EngineEvent>
//!     │
//!     └── run_with_prerequisites / run_all
//!             │
//!             ├── find_cycle     → CyclicDependency, nothing touched
//!             ├── resolve_order  → prerequisites before dependents
//!             ├── mark pending
//!             └── for each cell: running → CellRunner::run().await → success | error
//!                     ├── on failure: remaining pending cells back to idle
//!                     └── on cancel:  ActiveRun drop guard releases the same way
//! ```
//!
//! # Module Structure
//!
//! - `context` - Run operation trait and typed outcome
//! - `engine` - Registry mutators and the scheduler
//! - `events` - Progress events
//! - `outcome` - Result of a scheduling operation

mod context;
mod engine;
mod events;
mod outcome;

pub use context::{CellFuture, CellOutcome, CellRunner};
pub use engine::{CellEngine, WeakCellEngine};
pub use events::{DEFAULT_EVENT_CAPACITY, EngineEvent};
pub use outcome::RunOutcome;
