//! Startup staging: the working directory and the bundled resource archive.

mod archive;
mod workdir;

pub use archive::{unpack, ArchiveSource, UnpackReport};
pub use workdir::WorkDir;

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while preparing the working directory.
#[derive(Debug, Error)]
pub enum StagingError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The archive is unreadable or corrupt.
    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The archive does not exist.
    #[error("Archive not found: {}", .0.display())]
    ArchiveNotFound(PathBuf),

    /// An archive entry would be written outside the working directory.
    #[error("Archive entry escapes the working directory: {0}")]
    UnsafeEntry(String),

    /// The requested working directory already exists.
    #[error("Working directory already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
}
