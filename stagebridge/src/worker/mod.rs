//! The external worker process and its line-oriented channels.
//!
//! This module provides:
//! - Executable resolution and launch parameters
//! - `WorkerHandle` for line exchange and bounded termination

mod handle;
mod launch;

pub use handle::{TerminationReport, WorkerHandle};
pub use launch::{resolve_executable, LaunchSpec};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while launching or talking to a worker.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The executable could not be found.
    #[error("Executable not found: {0}")]
    NotFound(String),

    /// The executable path is not a regular file.
    #[error("Executable is not a file: {}", .0.display())]
    NotAFile(PathBuf),

    /// The executable lacks execute permission.
    #[error("Executable is not runnable: {}", .0.display())]
    NotExecutable(PathBuf),

    /// The process could not be spawned.
    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker's input or output channel is closed.
    #[error("Worker channel closed")]
    Closed,

    /// No response arrived within the read timeout.
    #[error("No response from worker within {0:?}")]
    TimedOut(Duration),

    /// The worker wrote a line that is not valid UTF-8.
    #[error("Worker output is not valid UTF-8")]
    InvalidUtf8,

    /// Reading from or writing to the worker failed.
    #[error("Worker IO error: {0}")]
    Io(#[from] std::io::Error),
}
