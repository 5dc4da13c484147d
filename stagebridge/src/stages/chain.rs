//! Sequential composition of two stages.

use super::{RecordStage, StopReport};
use crate::core::{Outcome, StageState};
use crate::errors::Result;
use async_trait::async_trait;
use tracing::warn;

/// Feeds every record emitted by `first` into `second`.
///
/// A skip in `first` short-circuits; `second` never sees the record.
#[derive(Debug)]
pub struct Chain<A, B> {
    name: String,
    first: A,
    second: B,
}

impl<A, B> Chain<A, B>
where
    A: RecordStage,
    B: RecordStage<Input = A::Output>,
{
    /// Composes two stages.
    pub fn new(first: A, second: B) -> Self {
        let name = format!("{}>{}", first.name(), second.name());
        Self {
            name,
            first,
            second,
        }
    }

    /// Returns the upstream stage.
    pub const fn first(&self) -> &A {
        &self.first
    }

    /// Returns the downstream stage.
    pub const fn second(&self) -> &B {
        &self.second
    }
}

#[async_trait]
impl<A, B> RecordStage for Chain<A, B>
where
    A: RecordStage,
    B: RecordStage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StageState {
        let states = [self.first.state(), self.second.state()];
        if states.contains(&StageState::Failed) {
            StageState::Failed
        } else if states.contains(&StageState::Stopped) {
            StageState::Stopped
        } else if states.iter().all(|s| s.is_running()) {
            StageState::Running
        } else if states.contains(&StageState::Starting) || states.contains(&StageState::Running) {
            StageState::Starting
        } else {
            StageState::Created
        }
    }

    async fn start(&self) -> Result<()> {
        self.first.start().await?;
        if let Err(err) = self.second.start().await {
            warn!(chain = %self.name, error = %err, "Downstream stage failed to start");
            self.first.stop().await;
            return Err(err);
        }
        Ok(())
    }

    async fn process(&self, input: A::Input) -> Result<Outcome<B::Output>> {
        match self.first.process(input).await? {
            Outcome::Emit(intermediate) => self.second.process(intermediate).await,
            Outcome::Skip(reason) => Ok(Outcome::Skip(reason)),
        }
    }

    async fn stop(&self) -> StopReport {
        let previous = self.state();
        let first = self.first.stop().await;
        let second = self.second.stop().await;

        let mut report = StopReport::new(&self.name, previous);
        report.already_stopped = first.already_stopped && second.already_stopped;
        report.work_dir_removed = first.work_dir_removed || second.work_dir_removed;
        report.inner = vec![first, second];
        report
    }
}
