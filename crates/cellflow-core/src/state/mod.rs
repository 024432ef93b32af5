//! Cell bookkeeping state.
//!
//! The registry is published through a `tokio::sync::watch` channel owned by
//! the engine, so hosts always read the latest snapshot.

mod registry;

pub use registry::Registry;
