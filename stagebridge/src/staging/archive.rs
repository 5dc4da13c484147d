//! Zip archive unpacking.

use super::StagingError;
use std::fs;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where the bundled resource archive comes from.
#[derive(Debug, Clone)]
pub enum ArchiveSource {
    /// A zip file on disk.
    File(PathBuf),
    /// A zip archive held in memory, e.g. from `include_bytes!`.
    Bytes(Arc<[u8]>),
}

impl ArchiveSource {
    /// Creates a source from in-memory bytes.
    #[must_use]
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Checks that the archive can be opened, without extracting it.
    pub fn check_exists(&self) -> Result<(), StagingError> {
        match self {
            Self::File(path) if !path.is_file() => Err(StagingError::ArchiveNotFound(path.clone())),
            _ => Ok(()),
        }
    }
}

impl std::fmt::Display for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Bytes(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Summary of an unpacked archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Number of regular files written.
    pub files: usize,
    /// Number of directories created.
    pub directories: usize,
    /// Total uncompressed bytes written.
    pub bytes: u64,
}

/// Unpacks `source` into `dest`, preserving relative paths and unix
/// permission bits.
///
/// `dest` must already exist.
pub fn unpack(source: &ArchiveSource, dest: &Path) -> Result<UnpackReport, StagingError> {
    source.check_exists()?;
    let report = match source {
        ArchiveSource::File(path) => extract(fs::File::open(path)?, dest)?,
        ArchiveSource::Bytes(bytes) => extract(Cursor::new(bytes.as_ref()), dest)?,
    };
    debug!(
        archive = %source,
        dest = %dest.display(),
        files = report.files,
        directories = report.directories,
        "Unpacked archive"
    );
    Ok(report)
}

fn extract<R: Read + Seek>(reader: R, dest: &Path) -> Result<UnpackReport, StagingError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    let mut report = UnpackReport::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| StagingError::UnsafeEntry(entry.name().to_string()))?;
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            report.directories += 1;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        report.bytes += std::io::copy(&mut entry, &mut out)?;
        report.files += 1;
        restore_permissions(&target, entry.unix_mode())?;
    }

    Ok(report)
}

#[cfg(unix)]
fn restore_permissions(target: &Path, mode: Option<u32>) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    match mode {
        Some(mode) => fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777)),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn restore_permissions(_target: &Path, _mode: Option<u32>) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_zip;

    #[test]
    fn test_unpack_preserves_relative_paths() {
        let bytes = build_zip(&[
            ("sentiment/", None, 0o755),
            ("sentiment/score.sh", Some("echo hi\n"), 0o755),
            ("sentiment/data/words.txt", Some("good\nbad\n"), 0o644),
        ]);
        let dest = tempfile::tempdir().unwrap();

        let report = unpack(&ArchiveSource::from_bytes(bytes), dest.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.directories, 1);
        assert_eq!(
            fs::read_to_string(dest.path().join("sentiment/data/words.txt")).unwrap(),
            "good\nbad\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unpack_restores_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let bytes = build_zip(&[("bin/run.sh", Some("#!/bin/sh\n"), 0o755)]);
        let dest = tempfile::tempdir().unwrap();
        unpack(&ArchiveSource::from_bytes(bytes), dest.path()).unwrap();

        let mode = fs::metadata(dest.path().join("bin/run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_unpack_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("bundle.zip");
        fs::write(&archive_path, build_zip(&[("a.txt", Some("a"), 0o644)])).unwrap();
        let dest = dir.path().join("out");
        fs::create_dir(&dest).unwrap();

        let report = unpack(&ArchiveSource::File(archive_path), &dest).unwrap();
        assert_eq!(report.files, 1);
        assert_eq!(report.bytes, 1);
    }

    #[test]
    fn test_missing_archive() {
        let dest = tempfile::tempdir().unwrap();
        let source = ArchiveSource::File(dest.path().join("nope.zip"));

        assert!(matches!(
            unpack(&source, dest.path()),
            Err(StagingError::ArchiveNotFound(_))
        ));
    }

    #[test]
    fn test_corrupt_archive() {
        let dest = tempfile::tempdir().unwrap();
        let source = ArchiveSource::from_bytes(b"definitely not a zip".to_vec());

        assert!(matches!(
            unpack(&source, dest.path()),
            Err(StagingError::Archive(_))
        ));
    }
}
