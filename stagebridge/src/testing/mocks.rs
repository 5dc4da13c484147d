//! In-process stages for runner and composition tests.

use crate::core::{Outcome, StageState};
use crate::errors::{BridgeError, Result};
use crate::stages::{RecordStage, StopReport};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Echoes records and remembers every input and lifecycle call.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    state: Mutex<StageState>,
    inputs: Mutex<Vec<String>>,
    stop_calls: Mutex<usize>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(StageState::Created),
            inputs: Mutex::new(Vec::new()),
            stop_calls: Mutex::new(0),
        }
    }

    /// Returns the inputs seen so far.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().clone()
    }

    /// Returns how many times `stop` was called.
    pub fn stop_calls(&self) -> usize {
        *self.stop_calls.lock()
    }
}

#[async_trait]
impl RecordStage for RecordingStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StageState {
        *self.state.lock()
    }

    async fn start(&self) -> Result<()> {
        *self.state.lock() = StageState::Running;
        Ok(())
    }

    async fn process(&self, input: String) -> Result<Outcome<String>> {
        self.inputs.lock().push(input.clone());
        Ok(Outcome::Emit(input))
    }

    async fn stop(&self) -> StopReport {
        *self.stop_calls.lock() += 1;
        let previous = std::mem::replace(&mut *self.state.lock(), StageState::Stopped);
        StopReport::new(&self.name, previous)
    }
}

/// A stage whose `start` always fails.
#[derive(Debug)]
pub struct FailingStartStage {
    name: String,
    state: Mutex<StageState>,
}

impl FailingStartStage {
    /// Creates a new failing stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(StageState::Created),
        }
    }
}

#[async_trait]
impl RecordStage for FailingStartStage {
    type Input = String;
    type Output = String;

    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> StageState {
        *self.state.lock()
    }

    async fn start(&self) -> Result<()> {
        *self.state.lock() = StageState::Failed;
        Err(BridgeError::startup(&self.name, "executable not found"))
    }

    async fn process(&self, _input: String) -> Result<Outcome<String>> {
        Err(BridgeError::unavailable(&self.name, "stage never started"))
    }

    async fn stop(&self) -> StopReport {
        let previous = std::mem::replace(&mut *self.state.lock(), StageState::Stopped);
        StopReport::new(&self.name, previous)
    }
}
