//! Run operations supplied by cell owners.

use std::future::Future;

use futures::future::BoxFuture;

use crate::error::Result;

/// How a cell's run operation ended.
///
/// A run that cannot complete at all (the interpreter raised, the kernel went
/// away) should return an `Err` instead; the scheduler surfaces that error's
/// message verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellOutcome {
    /// The cell ran and its output is valid.
    Success,
    /// The cell ran but reported a failure.
    Failure(String),
}

impl CellOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Future returned by a cell's run operation.
pub type CellFuture = BoxFuture<'static, Result<CellOutcome>>;

/// Asynchronous run operation for a cell.
///
/// Invoked with no arguments each time the scheduler dispatches the cell.
/// Owners that need to touch the registry (for example to bump the execution
/// count) capture a [`WeakCellEngine`](super::WeakCellEngine); the registry
/// owns the run operation, so a strong handle would keep the engine alive.
///
/// Implemented for any `Fn() -> impl Future<Output = Result<CellOutcome>>`
/// closure.
pub trait CellRunner: Send + Sync {
    fn run(&self) -> CellFuture;
}

impl<F, Fut> CellRunner for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<CellOutcome>> + Send + 'static,
{
    fn run(&self) -> CellFuture {
        Box::pin(self())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_outcome_helpers() {
        assert!(CellOutcome::Success.is_success());
        let failed = CellOutcome::failure("division by zero");
        assert!(!failed.is_success());
        assert_eq!(failed, CellOutcome::Failure("division by zero".to_string()));
    }

    #[tokio::test]
    async fn test_closure_runner() {
        let runner = || async { Ok::<_, Error>(CellOutcome::Success) };
        assert_eq!(CellRunner::run(&runner).await, Ok(CellOutcome::Success));
    }

    #[tokio::test]
    async fn test_struct_runner() {
        struct Failing;
        impl CellRunner for Failing {
            fn run(&self) -> CellFuture {
                Box::pin(async { Err(Error::execution("failing", "kernel died")) })
            }
        }

        let err = Failing.run().await.unwrap_err();
        assert_eq!(err.to_string(), "kernel died");
    }
}
