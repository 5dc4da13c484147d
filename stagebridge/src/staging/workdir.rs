//! Ownership-scoped working directory.

use super::StagingError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A directory created for one stage instance and removed when the stage
/// stops.
///
/// Removal happens at most once; dropping an unremoved `WorkDir` removes it.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    removed: bool,
}

impl WorkDir {
    /// Creates the working directory.
    ///
    /// With `Some(path)` the directory must not exist yet. With `None` a
    /// uniquely named directory is created under the system temp directory.
    pub fn create(requested: Option<&Path>) -> Result<Self, StagingError> {
        let path = match requested {
            Some(path) => {
                if path.exists() {
                    return Err(StagingError::AlreadyExists(path.to_path_buf()));
                }
                fs::create_dir_all(path)?;
                path.to_path_buf()
            }
            None => {
                let path = std::env::temp_dir()
                    .join(format!("stagebridge-{}", uuid::Uuid::new_v4().simple()));
                fs::create_dir(&path)?;
                path
            }
        };

        // Relative paths would break once the worker runs elsewhere.
        let path = match fs::canonicalize(&path) {
            Ok(absolute) => absolute,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&path) {
                    error!(
                        path = %path.display(),
                        error = %cleanup,
                        "Could not delete work dir"
                    );
                }
                return Err(e.into());
            }
        };

        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Returns the absolute path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once removal has been attempted.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed
    }

    /// Recursively removes the directory.
    ///
    /// Returns true if the directory is gone. Failures are logged, never
    /// propagated, and never retried.
    pub fn remove(&mut self) -> bool {
        if self.removed {
            return false;
        }
        self.removed = true;

        info!(path = %self.path.display(), "Deleting work dir");
        match fs::remove_dir_all(&self.path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Could not delete work dir");
                false
            }
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.removed {
            self.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_requested_dir() {
        let base = tempfile::tempdir().unwrap();
        let requested = base.path().join("work");

        let mut dir = WorkDir::create(Some(&requested)).unwrap();
        assert!(dir.path().is_absolute());
        assert!(requested.is_dir());

        assert!(dir.remove());
        assert!(!requested.exists());
    }

    #[test]
    fn test_create_rejects_existing_dir() {
        let base = tempfile::tempdir().unwrap();
        assert!(matches!(
            WorkDir::create(Some(base.path())),
            Err(StagingError::AlreadyExists(_))
        ));
        assert!(base.path().exists());
    }

    #[test]
    fn test_create_temp_dir() {
        let mut dir = WorkDir::create(None).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.is_dir());

        dir.remove();
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut dir = WorkDir::create(None).unwrap();
        fs::write(dir.path().join("f.txt"), "x").unwrap();

        assert!(dir.remove());
        assert!(dir.is_removed());
        assert!(!dir.remove());
    }

    #[test]
    fn test_remove_tolerates_external_deletion() {
        let mut dir = WorkDir::create(None).unwrap();
        fs::remove_dir_all(dir.path()).unwrap();
        assert!(dir.remove());
    }

    #[test]
    fn test_drop_removes_dir() {
        let path = {
            let dir = WorkDir::create(None).unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
