//! Exclusive, process-crossing writer lock.
//!
//! The lock is an advisory `flock`-style lock on an empty sentinel file. It is
//! held for as long as the [`LedgerLock`] guard lives and released when the
//! guard drops, on every exit path including `?` returns and unwinding.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};

/// Scoped guard for the ledger's exclusive writer lock.
#[derive(Debug)]
pub struct LedgerLock {
    file: File,
    path: PathBuf,
}

impl LedgerLock {
    /// Block until the exclusive lock on `path` is held.
    ///
    /// The sentinel file is created if needed; its contents are never touched.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = Self::open_sentinel(path)?;
        FileExt::lock_exclusive(&file).map_err(|source| LedgerError::Lock {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "ledger lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = Self::open_sentinel(path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self {
                file,
                path: path.to_path_buf(),
            })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(source) => Err(LedgerError::Lock {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_sentinel(path: &Path) -> Result<File> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LedgerError::Lock {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "failed to release ledger lock");
        } else {
            debug!(path = %self.path.display(), "ledger lock released");
        }
    }
}
