//! Stage trait and implementations.
//!
//! A stage turns one input record into zero or one output record. Stages
//! have an explicit lifecycle: `start` once, `process` any number of
//! times, and `stop` exactly once (further calls are no-ops).

mod chain;
mod external;

pub use chain::Chain;
pub use external::ExternalProcessStage;

use crate::core::{Outcome, StageState};
use crate::errors::{BridgeError, Result};
use crate::worker::TerminationReport;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Trait for record-processing stages.
#[async_trait]
pub trait RecordStage: Send + Sync {
    /// Record type accepted by the stage.
    type Input: Send;
    /// Record type emitted by the stage.
    type Output: Send;

    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns the current lifecycle state.
    fn state(&self) -> StageState;

    /// Acquires resources and moves the stage to `Running`.
    async fn start(&self) -> Result<()>;

    /// Processes one record.
    ///
    /// # Returns
    ///
    /// The record to emit, a skip, or an error. After a worker-level error
    /// every further call fails without doing any work.
    async fn process(&self, input: Self::Input) -> Result<Outcome<Self::Output>>;

    /// Releases all resources. Never fails; calling it again is a no-op.
    async fn stop(&self) -> StopReport;
}

#[async_trait]
impl<S> RecordStage for Arc<S>
where
    S: RecordStage + ?Sized,
{
    type Input = S::Input;
    type Output = S::Output;

    fn name(&self) -> &str {
        (**self).name()
    }

    fn state(&self) -> StageState {
        (**self).state()
    }

    async fn start(&self) -> Result<()> {
        (**self).start().await
    }

    async fn process(&self, input: Self::Input) -> Result<Outcome<Self::Output>> {
        (**self).process(input).await
    }

    async fn stop(&self) -> StopReport {
        (**self).stop().await
    }
}

/// What a call to `stop` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    /// Stage name.
    pub stage: String,
    /// State before the call.
    pub previous_state: StageState,
    /// True if the stage had already been stopped and nothing was done.
    pub already_stopped: bool,
    /// How the worker went away, if there was one.
    pub worker: Option<TerminationReport>,
    /// True if this call removed the working directory.
    pub work_dir_removed: bool,
    /// Reports of inner stages, for composite stages.
    pub inner: Vec<StopReport>,
}

impl StopReport {
    /// Creates a report for a stage that had nothing to release.
    #[must_use]
    pub fn new(stage: impl Into<String>, previous_state: StageState) -> Self {
        Self {
            stage: stage.into(),
            previous_state,
            already_stopped: previous_state == StageState::Stopped,
            worker: None,
            work_dir_removed: false,
            inner: Vec::new(),
        }
    }
}

/// A stage backed by an in-process function.
///
/// Useful for composing with external stages and for tests.
pub struct FnStage<IN, OUT, F> {
    name: String,
    func: F,
    state: RwLock<StageState>,
    _marker: PhantomData<fn(IN) -> OUT>,
}

impl<IN, OUT, F> FnStage<IN, OUT, F>
where
    F: Fn(IN) -> Result<Outcome<OUT>> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            state: RwLock::new(StageState::Created),
            _marker: PhantomData,
        }
    }
}

impl<IN, OUT, F> Debug for FnStage<IN, OUT, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .field("state", &*self.state.read())
            .finish()
    }
}

#[async_trait]
impl<IN, OUT, F> RecordStage for FnStage<IN, OUT, F>
where
    IN: Send + 'static,
    OUT: Send + 'static,
    F: Fn(IN) -> Result<Outcome<OUT>> + Send + Sync,
{
    type Input = IN;
    type Output = OUT;

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StageState {
        *self.state.read()
    }

    async fn start(&self) -> Result<()> {
        let mut state = self.state.write();
        let current = *state;
        if current != StageState::Created {
            return Err(BridgeError::startup(
                &self.name,
                format!("cannot start from state '{current}'"),
            ));
        }
        *state = StageState::Running;
        Ok(())
    }

    async fn process(&self, input: IN) -> Result<Outcome<OUT>> {
        let state = self.state();
        if !state.is_running() {
            return Err(BridgeError::unavailable(
                &self.name,
                format!("stage is {state}"),
            ));
        }
        (self.func)(input)
    }

    async fn stop(&self) -> StopReport {
        let previous = std::mem::replace(&mut *self.state.write(), StageState::Stopped);
        StopReport::new(&self.name, previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SkipReason;

    fn doubler() -> FnStage<i64, i64, impl Fn(i64) -> Result<Outcome<i64>> + Send + Sync> {
        FnStage::new("double", |n: i64| {
            if n < 0 {
                Ok(Outcome::Skip(SkipReason::Encoder))
            } else {
                Ok(Outcome::Emit(n * 2))
            }
        })
    }

    #[tokio::test]
    async fn test_fn_stage_lifecycle() {
        let stage = doubler();
        assert_eq!(stage.name(), "double");
        assert_eq!(stage.state(), StageState::Created);

        stage.start().await.unwrap();
        assert_eq!(stage.process(4).await.unwrap(), Outcome::Emit(8));
        assert_eq!(
            stage.process(-1).await.unwrap(),
            Outcome::Skip(SkipReason::Encoder)
        );

        let report = stage.stop().await;
        assert_eq!(report.previous_state, StageState::Running);
        assert!(!report.already_stopped);

        let again = stage.stop().await;
        assert!(again.already_stopped);
    }

    #[tokio::test]
    async fn test_fn_stage_rejects_records_when_not_running() {
        let stage = doubler();
        let err = stage.process(1).await.unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::WorkerUnavailable);

        stage.start().await.unwrap();
        assert!(stage.start().await.is_err());

        stage.stop().await;
        assert!(stage.process(1).await.is_err());
    }

    #[tokio::test]
    async fn test_arc_stage_delegates() {
        let stage = Arc::new(doubler());
        let shared = stage.clone();

        shared.start().await.unwrap();
        assert_eq!(stage.state(), StageState::Running);
        assert_eq!(shared.process(21).await.unwrap(), Outcome::Emit(42));
        shared.stop().await;
        assert_eq!(stage.state(), StageState::Stopped);
    }
}
