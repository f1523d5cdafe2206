//! Advisory lock that keeps two runs off the same tap.
//!
//! The lock is an exclusive OS file lock (via `fs4`) on a file at the tap
//! root. Acquisition never waits: a run that finds the lock held fails at
//! once with [`TapError::Locked`]. The lock is released when the
//! [`RunLock`] is dropped, so every exit path of a run releases it. The
//! lock file itself stays in place; unlinking a locked file lets two
//! processes lock different inodes at once.
//!
//! The file also serves as a one-line journal: a run records the stage it
//! reached ([`RunLock::record`]) so the next run can tell backups left by
//! a killed run from backups a verified run failed to remove.

use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::RunState;
use crate::core::TapError;

/// Held for the duration of one pipeline run.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path` or fail immediately.
    ///
    /// # Errors
    ///
    /// - [`TapError::Locked`] if another process holds the lock
    /// - [`TapError::FileSystem`] if the lock file cannot be opened
    pub async fn acquire(path: &Path) -> Result<Self, TapError> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(|e| TapError::Other {
                message: format!("lock task panicked: {e}"),
            })?
    }

    fn acquire_blocking(path: PathBuf) -> Result<Self, TapError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|_| TapError::FileSystem {
                operation: "open lock file".to_string(),
                path: path.display().to_string(),
            })?;

        match file.try_lock_exclusive() {
            Ok(true) => {
                debug!(lock = %path.display(), "Run lock acquired");
                Ok(Self {
                    file,
                    path,
                })
            }
            Ok(false) | Err(_) => Err(TapError::Locked {
                path: path.display().to_string(),
            }),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stage recorded by the last run that held this lock.
    ///
    /// `None` for a fresh lock file or one holding anything unexpected.
    #[must_use]
    pub fn recorded_state(&self) -> Option<RunState> {
        let mut content = String::new();
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0)).ok()?;
        file.read_to_string(&mut content).ok()?;
        serde_json::from_str(content.trim()).ok()
    }

    /// Replace the journal with `state` and sync it to disk.
    pub fn record(&self, state: RunState) -> Result<(), TapError> {
        let io_error = |_| TapError::FileSystem {
            operation: format!("record run state '{state}'"),
            path: self.path.display().to_string(),
        };
        let line = serde_json::to_string(&state).map_err(|e| TapError::Other {
            message: e.to_string(),
        })?;

        let mut file = &self.file;
        file.set_len(0).map_err(io_error)?;
        file.seek(SeekFrom::Start(0)).map_err(io_error)?;
        writeln!(file, "{line}").map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        debug!(lock = %self.path.display(), "Recorded run state {state}");
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!(lock = %self.path.display(), error = %e, "Failed to unlock run lock");
        }
        debug!(lock = %self.path.display(), "Run lock released");
    }
}
