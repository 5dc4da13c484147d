//! Drives a stage from an input source to an emitter.

use super::{Emitter, FailureMode, FailureRecord};
use crate::core::{Outcome, StageState};
use crate::errors::BridgeError;
use crate::stages::{RecordStage, StopReport};
use serde::Serialize;
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Result of a complete run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Records taken from the input.
    pub received: u64,
    /// Records delivered to the emitter.
    pub emitted: u64,
    /// Records that produced no output.
    pub skipped: u64,
    /// Failures in the order they happened.
    pub failures: Vec<FailureRecord>,
    /// True if the input was drained without an aborting failure.
    pub completed: bool,
    /// What stopping the stage did.
    #[serde(skip)]
    pub stop: StopReport,
}

/// Counters accumulated while records flow.
#[derive(Debug, Default)]
struct Tally {
    received: u64,
    emitted: u64,
    skipped: u64,
    failures: Vec<FailureRecord>,
    completed: bool,
}

impl RunSummary {
    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Runs a stage over a stream of records.
///
/// The stage is started if it has not been started yet, and is always
/// stopped before the run returns.
#[derive(Debug)]
pub struct StageRunner<S> {
    stage: S,
    mode: FailureMode,
}

impl<S: RecordStage> StageRunner<S> {
    /// Creates a fail-fast runner.
    pub const fn new(stage: S) -> Self {
        Self {
            stage,
            mode: FailureMode::FailFast,
        }
    }

    /// Sets the failure mode.
    #[must_use]
    pub const fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the stage.
    pub const fn stage(&self) -> &S {
        &self.stage
    }

    /// Returns the stage, consuming the runner.
    pub fn into_inner(self) -> S {
        self.stage
    }

    /// Processes records from a channel until it closes.
    pub async fn run<E>(&self, mut input: mpsc::Receiver<S::Input>, emitter: &E) -> RunSummary
    where
        E: Emitter<S::Output> + ?Sized,
    {
        let mut tally = Tally::default();
        if self.begin(&mut tally).await.is_continue() {
            let mut aborted = false;
            while let Some(record) = input.recv().await {
                if self.handle(record, emitter, &mut tally).await.is_break() {
                    aborted = true;
                    break;
                }
            }
            tally.completed = !aborted;
        }
        self.finish(tally).await
    }

    /// Processes every record of an iterator.
    pub async fn run_iter<I, E>(&self, records: I, emitter: &E) -> RunSummary
    where
        I: IntoIterator<Item = S::Input>,
        E: Emitter<S::Output> + ?Sized,
    {
        let mut tally = Tally::default();
        if self.begin(&mut tally).await.is_continue() {
            let mut aborted = false;
            for record in records {
                if self.handle(record, emitter, &mut tally).await.is_break() {
                    aborted = true;
                    break;
                }
            }
            tally.completed = !aborted;
        }
        self.finish(tally).await
    }

    async fn begin(&self, tally: &mut Tally) -> ControlFlow<()> {
        let name = self.stage.name();
        let state = self.stage.state();
        info!(stage = %name, mode = ?self.mode, state = %state, "Run starting");

        let result = match state {
            StageState::Created => self.stage.start().await,
            StageState::Running => Ok(()),
            other => Err(BridgeError::startup(
                name,
                format!("cannot run a stage in state '{other}'"),
            )),
        };

        match result {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                error!(stage = %name, error = %err, "Run aborted before the first record");
                tally.failures.push(FailureRecord::from_error(name, &err));
                ControlFlow::Break(())
            }
        }
    }

    async fn handle<E>(
        &self,
        record: S::Input,
        emitter: &E,
        tally: &mut Tally,
    ) -> ControlFlow<()>
    where
        E: Emitter<S::Output> + ?Sized,
    {
        let index = tally.received;
        tally.received += 1;

        let err = match self.stage.process(record).await {
            Ok(Outcome::Emit(output)) => match emitter.emit(output).await {
                Ok(()) => {
                    tally.emitted += 1;
                    return ControlFlow::Continue(());
                }
                Err(err) => err,
            },
            Ok(Outcome::Skip(_)) => {
                tally.skipped += 1;
                return ControlFlow::Continue(());
            }
            Err(err) => err,
        };

        let name = self.stage.name();
        let failure = FailureRecord::from_error(name, &err).at_record(index);
        if self.mode.tolerates(&err) {
            warn!(stage = %name, record = index, error = %err, "Record failed, continuing");
            tally.failures.push(failure.recoverable());
            ControlFlow::Continue(())
        } else {
            error!(stage = %name, record = index, error = %err, "Record failed, aborting run");
            tally.failures.push(failure);
            ControlFlow::Break(())
        }
    }

    async fn finish(&self, tally: Tally) -> RunSummary {
        let stop = self.stage.stop().await;
        info!(
            stage = %self.stage.name(),
            received = tally.received,
            emitted = tally.emitted,
            skipped = tally.skipped,
            failures = tally.failures.len(),
            completed = tally.completed,
            "Run finished"
        );
        RunSummary {
            received: tally.received,
            emitted: tally.emitted,
            skipped: tally.skipped,
            failures: tally.failures,
            completed: tally.completed,
            stop,
        }
    }
}
