// SPDX-License-Identifier: GPL-3.0-only
//! Single-instance guard
//!
//! Two watchers on the same device would keep killing each other's
//! pipelines, so the daemon holds an exclusive flock for its whole lifetime.

use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

/// Held flock on the lock file; released when dropped (or the process dies)
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Try to take the lock without blocking
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|source| AppError::InstanceLock {
            path: path.to_path_buf(),
            source,
        })?;

        // flock is tied to the open file description, so a second open in the
        // same process conflicts as well
        let lock_result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };

        if lock_result != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
                return Err(AppError::AlreadyRunning {
                    path: path.to_path_buf(),
                });
            }
            return Err(AppError::InstanceLock {
                path: path.to_path_buf(),
                source: err,
            });
        }

        debug!("Acquired instance lock {}", path.display());
        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
