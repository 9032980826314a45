//! Atomic replacement of files watched by external consumers
//!
//! Content is written to a temporary file in the destination's directory and
//! renamed over the destination, so a reader sees either the old or the new
//! file and never a partial one.

use crate::error::CollectorError;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Fully written and synced content waiting to replace its destination
///
/// Dropping it without [`commit`](StagedFile::commit) removes the temporary
/// file and leaves the destination as it was.
#[derive(Debug)]
pub struct StagedFile {
    temp: NamedTempFile,
    destination: PathBuf,
}

impl StagedFile {
    /// Rename the staged content over the destination
    pub fn commit(self) -> Result<(), CollectorError> {
        let destination = self.destination;
        self.temp
            .persist(&destination)
            .map_err(|e| CollectorError::persistence(&destination, e.error))?;
        Ok(())
    }
}

/// Replace `destination` with `contents`
pub fn persist_atomically(destination: &Path, contents: &[u8]) -> Result<(), CollectorError> {
    write_atomically(destination, |file| file.write_all(contents))
}

/// Replace `destination` with whatever `write` produces
///
/// The temporary file is removed if `write`, the sync or the rename fails;
/// `destination` is untouched in that case.
pub fn write_atomically<F>(destination: &Path, write: F) -> Result<(), CollectorError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    stage(destination, write)?.commit()
}

/// Write and sync the content for `destination` without touching it yet
pub fn stage<F>(destination: &Path, write: F) -> Result<StagedFile, CollectorError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let fail = |source: io::Error| CollectorError::persistence(destination, source);

    let mut temp = NamedTempFile::new_in(dir).map_err(fail)?;
    write(temp.as_file_mut()).map_err(fail)?;
    temp.as_file().sync_all().map_err(fail)?;

    // Temp files are created owner-only; the consumer usually runs as another user.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o644))
            .map_err(fail)?;
    }

    Ok(StagedFile {
        temp,
        destination: destination.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_persist_creates_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("targets.json");

        persist_atomically(&destination, b"[1]").unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"[1]");

        persist_atomically(&destination, b"[]").unwrap();
        assert_eq!(std::fs::read(&destination).unwrap(), b"[]");
        assert_eq!(entries(temp_dir.path()), vec!["targets.json"]);
    }

    #[test]
    fn test_failed_write_leaves_destination_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("targets.json");
        std::fs::write(&destination, "previous").unwrap();

        let result = write_atomically(&destination, |file| {
            file.write_all(b"[{\"targets\":")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        });

        assert!(matches!(result, Err(CollectorError::Persistence { .. })));
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "previous");
        assert_eq!(entries(temp_dir.path()), vec!["targets.json"]);
    }

    #[test]
    fn test_missing_directory_is_a_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("missing").join("targets.json");

        let err = persist_atomically(&destination, b"[]").unwrap_err();
        match err {
            CollectorError::Persistence { path, .. } => assert_eq!(path, destination),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dropped_stage_leaves_destination_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("targets.json");
        std::fs::write(&destination, "previous").unwrap();

        let staged = stage(&destination, |file| file.write_all(b"[]")).unwrap();
        assert_eq!(entries(temp_dir.path()).len(), 2);
        drop(staged);

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "previous");
        assert_eq!(entries(temp_dir.path()), vec!["targets.json"]);
    }

    #[test]
    fn test_commit_replaces_destination() {
        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("targets.json");
        std::fs::write(&destination, "previous").unwrap();

        stage(&destination, |file| file.write_all(b"[]"))
            .unwrap()
            .commit()
            .unwrap();

        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "[]");
        assert_eq!(entries(temp_dir.path()), vec!["targets.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_persisted_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("targets.json");
        persist_atomically(&destination, b"[]").unwrap();

        let mode = std::fs::metadata(&destination).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }
}
