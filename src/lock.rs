use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use log::debug;
use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};

use osutils::files;
use strata_api::error::{CommitError, ReportError, StorageError};

/// Exclusive lock held while a commit runs, so two processes never change
/// the same system at once. Released on drop.
#[derive(Debug)]
pub struct CommitLock {
    _lock: Flock<File>,
    path: PathBuf,
}

impl CommitLock {
    /// Takes the lock without waiting. Fails with `LockHeld` when another
    /// process has it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let lock_error = || CommitError::Lock {
            path: path.display().to_string(),
        };

        if let Some(parent) = path.parent() {
            files::create_dirs(parent).structured(lock_error())?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .structured(lock_error())?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                debug!("Acquired commit lock '{}'", path.display());
                Ok(Self {
                    _lock: lock,
                    path: path.to_path_buf(),
                })
            }
            Err((_, errno)) if errno == Errno::EWOULDBLOCK => {
                Err(StorageError::new(CommitError::LockHeld {
                    path: path.display().to_string(),
                }))
            }
            Err((_, errno)) => Err(errno).structured(lock_error()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use strata_api::error::ErrorKind;

    use super::*;

    #[test]
    fn test_lock_is_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/strata/commit.lock");

        let lock = CommitLock::acquire(&path).unwrap();
        assert_eq!(lock.path(), path);

        let err = CommitLock::acquire(&path).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Commit(CommitError::LockHeld { .. })
        ));

        drop(lock);
        CommitLock::acquire(&path).unwrap();
    }
}
