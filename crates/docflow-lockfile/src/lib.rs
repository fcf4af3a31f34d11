//! Exclusive advisory file locks.
//!
//! The overdue batch holds one for its whole run so overlapping schedules
//! never work the same candidates twice.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("{} is held by another process", .path.display())]
    Held { path: PathBuf },

    #[error("failed to lock {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    pub fn is_held(&self) -> bool {
        matches!(self, Self::Held { .. })
    }
}

/// An exclusive lock released on drop.
#[derive(Debug)]
pub struct BatchLock {
    file: File,
    path: PathBuf,
}

impl BatchLock {
    /// Takes the lock without waiting. Creates the file when missing.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                Err(LockError::Held { path })
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for BatchLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("remind.lock");

        let first = BatchLock::try_acquire(&path).unwrap();
        assert_eq!(first.path(), path);
        let err = BatchLock::try_acquire(&path).unwrap_err();
        assert!(err.is_held());

        drop(first);
        BatchLock::try_acquire(&path).unwrap();
    }

    #[test]
    fn missing_parent_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchLock::try_acquire(dir.path().join("nope/remind.lock")).unwrap_err();
        assert!(!err.is_held());
    }
}
