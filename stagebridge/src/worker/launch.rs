//! Executable resolution and launch parameters.

use super::WorkerError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Everything needed to spawn a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Resolved, validated executable.
    pub executable: PathBuf,
    /// Arguments, placeholders already expanded.
    pub args: Vec<String>,
    /// Directory the worker runs in.
    pub current_dir: PathBuf,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
}

/// Locates `raw` and checks that it is a runnable file.
///
/// Absolute paths are used as given, relative paths with more than one
/// component resolve against `work_dir`, and bare names are looked up on
/// `PATH`.
pub fn resolve_executable(raw: &str, work_dir: &Path) -> Result<PathBuf, WorkerError> {
    let candidate = Path::new(raw);
    let path = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else if candidate.components().count() > 1 {
        work_dir.join(candidate)
    } else {
        which::which(raw).map_err(|e| WorkerError::NotFound(format!("{raw}: {e}")))?
    };

    let metadata = std::fs::metadata(&path)
        .map_err(|e| WorkerError::NotFound(format!("{}: {e}", path.display())))?;
    if !metadata.is_file() {
        return Err(WorkerError::NotAFile(path));
    }
    if !is_executable(&metadata) {
        return Err(WorkerError::NotExecutable(path));
    }
    Ok(path)
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}
