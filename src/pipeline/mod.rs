// SPDX-License-Identifier: GPL-3.0-only
//! Pipeline process management
//!
//! Exactly one renderer owns the framebuffer at a time: either the live
//! capture pipeline (source connected) or the standby pattern (source
//! disconnected). [`PipelineManager`] keeps one pid slot per mode and hands
//! the framebuffer over by terminating the other slot before launching.

mod commands;
mod launcher;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub use launcher::{ProcessLauncher, ShellLauncher};

use crate::config::RENDERER_BINARY;
use crate::error::{AppError, Result};

/// Which pipeline should own the framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineMode {
    /// HDMI capture to framebuffer, with audio
    Connected,
    /// Snow pattern with a "Please Stand By" overlay
    Disconnected,
}

impl PipelineMode {
    pub fn opposite(self) -> Self {
        match self {
            PipelineMode::Connected => PipelineMode::Disconnected,
            PipelineMode::Disconnected => PipelineMode::Connected,
        }
    }

    /// Full shell command line for this mode
    pub fn command_line(self, renderer: &str) -> String {
        match self {
            PipelineMode::Connected => commands::capture_command(renderer),
            PipelineMode::Disconnected => commands::standby_command(renderer),
        }
    }
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::Connected => write!(f, "capture"),
            PipelineMode::Disconnected => write!(f, "standby"),
        }
    }
}

/// A launched pipeline, known only by its pid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineHandle {
    pub mode: PipelineMode,
    pub pid: u32,
}

/// Owns the two pid slots and the launcher
pub struct PipelineManager<L: ProcessLauncher> {
    launcher: L,
    connected: Option<PipelineHandle>,
    disconnected: Option<PipelineHandle>,
    settle_delay: Duration,
}

impl<L: ProcessLauncher> PipelineManager<L> {
    pub fn new(launcher: L, settle_delay: Duration) -> Self {
        Self {
            launcher,
            connected: None,
            disconnected: None,
            settle_delay,
        }
    }

    /// Live handle recorded for `mode`
    pub fn handle(&self, mode: PipelineMode) -> Option<PipelineHandle> {
        match mode {
            PipelineMode::Connected => self.connected,
            PipelineMode::Disconnected => self.disconnected,
        }
    }

    /// Mode whose pipeline is currently recorded as running
    pub fn active_mode(&self) -> Option<PipelineMode> {
        [PipelineMode::Connected, PipelineMode::Disconnected]
            .into_iter()
            .find(|mode| self.handle(*mode).is_some())
    }

    fn slot_mut(&mut self, mode: PipelineMode) -> &mut Option<PipelineHandle> {
        match mode {
            PipelineMode::Connected => &mut self.connected,
            PipelineMode::Disconnected => &mut self.disconnected,
        }
    }

    /// Hand the framebuffer to `mode`
    ///
    /// Terminates the other mode's pipeline (and a stale pipeline of the same
    /// mode), launches the new one and waits the settle delay. On failure no
    /// handle is recorded for `mode`.
    pub fn activate(&mut self, mode: PipelineMode) -> Result<PipelineHandle> {
        self.stop(mode.opposite());

        // Same-mode restart, e.g. the source switched resolution
        self.stop(mode);

        let renderer = self.resolve_renderer();

        if mode == PipelineMode::Connected {
            if let Err(e) = self.launcher.run(commands::APPLY_TIMINGS_COMMAND) {
                warn!("Failed to apply detected DV timings: {:#}", e);
            }
        }

        let command_line = mode.command_line(&renderer.to_string_lossy());
        debug!("Launching {} pipeline: {}", mode, command_line);

        let pid = self
            .launcher
            .spawn_detached(&command_line)
            .map_err(|source| AppError::Launch { mode, source })?;

        let handle = PipelineHandle { mode, pid };
        *self.slot_mut(mode) = Some(handle);

        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }

        info!("{} pipeline started with PID {}", mode, pid);
        Ok(handle)
    }

    /// Terminate and forget the pipeline recorded for `mode`, if any
    ///
    /// A failed SIGTERM usually means the pipeline already died on its own;
    /// the slot is cleared either way.
    pub fn stop(&mut self, mode: PipelineMode) {
        let Some(handle) = self.slot_mut(mode).take() else {
            return;
        };

        match self.launcher.terminate(handle.pid) {
            Ok(()) => info!("Terminated {} pipeline with PID {}", mode, handle.pid),
            Err(e) => warn!("Error terminating {} pipeline (PID {}): {:#}", mode, handle.pid, e),
        }
    }

    fn resolve_renderer(&self) -> PathBuf {
        match self.launcher.resolve_binary(RENDERER_BINARY) {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not locate {}: {:#}, launching by name", RENDERER_BINARY, e);
                PathBuf::from(RENDERER_BINARY)
            }
        }
    }
}
