// SPDX-License-Identifier: GPL-3.0-only
//! Error types for the daemon
//!
//! Startup failures (device, subscription, instance lock) end the process;
//! everything else is handled where it happens and only logged.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineMode;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Failed to open the capture device node
    #[error("Failed to open video device {}: {source}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// VIDIOC_SUBSCRIBE_EVENT was rejected
    #[error("Failed to subscribe to source change events: {0}")]
    Subscribe(#[source] std::io::Error),

    /// VIDIOC_DQEVENT failed with something other than EINTR/EAGAIN
    #[error("Failed to dequeue device event: {0}")]
    DequeueEvent(#[source] std::io::Error),

    /// Another instance already holds the lock file
    #[error("Another instance is already running (lock held on {})", path.display())]
    AlreadyRunning { path: PathBuf },

    /// The lock file could not be created or locked
    #[error("Failed to acquire instance lock {}: {source}", path.display())]
    InstanceLock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline process could not be started
    #[error("Failed to launch {mode} pipeline: {source}")]
    Launch {
        mode: PipelineMode,
        #[source]
        source: anyhow::Error,
    },
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Whether a dequeue error just means "try again"
    pub fn is_retryable_wait(err: &std::io::Error) -> bool {
        matches!(
            err.kind(),
            std::io::ErrorKind::Interrupted | std::io::ErrorKind::WouldBlock
        )
    }
}
