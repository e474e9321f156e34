// SPDX-License-Identifier: GPL-3.0-only
//! Spawning and signalling pipeline processes
//!
//! Pipelines are fire-and-forget: once launched the daemon keeps only the
//! pid and never waits on them. Everything that touches the OS lives behind
//! [`ProcessLauncher`] so a supervising launcher can replace the shell one.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow, bail};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use super::commands::shell_quote;

/// Common trait for process launch backends
pub trait ProcessLauncher {
    /// Locate a program on PATH
    fn resolve_binary(&self, name: &str) -> Result<PathBuf>;

    /// Run a shell command line and wait for it
    fn run(&self, command_line: &str) -> Result<()>;

    /// Start a shell command line in the background and return its pid
    fn spawn_detached(&self, command_line: &str) -> Result<u32>;

    /// Send SIGTERM to a previously launched pid
    fn terminate(&self, pid: u32) -> Result<()>;
}

/// Launches through `sh -c`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellLauncher;

impl ShellLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessLauncher for ShellLauncher {
    fn resolve_binary(&self, name: &str) -> Result<PathBuf> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("command -v {}", shell_quote(name)))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .context("Failed to run PATH lookup")?;

        if !output.status.success() {
            bail!("{} not found on PATH ({})", name, output.status);
        }

        let path = String::from_utf8(output.stdout).context("PATH lookup printed a non UTF-8 path")?;
        let path = path.trim();
        if path.is_empty() {
            bail!("PATH lookup printed nothing for {}", name);
        }

        debug!("Resolved {} to {}", name, path);
        Ok(PathBuf::from(path))
    }

    fn run(&self, command_line: &str) -> Result<()> {
        let status = Command::new("sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run `{}`", command_line))?;

        if !status.success() {
            bail!("`{}` exited with {}", command_line, status);
        }
        Ok(())
    }

    fn spawn_detached(&self, command_line: &str) -> Result<u32> {
        // The job's stdout goes to our stderr so the pipe only ever carries
        // the pid; sh exits right after `echo`, which closes it.
        let script = format!("{} 1>&2 & echo $!", command_line);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to spawn sh")?;

        let mut output = String::new();
        let read = match child.stdout.take() {
            Some(mut stdout) => stdout.read_to_string(&mut output).map(|_| ()),
            None => Ok(()),
        };

        // Always reap the launcher shell, even if reading its output failed
        let status = child.wait().context("Failed to wait for launcher shell")?;
        read.context("Failed to read pid from launcher shell")?;

        if !status.success() {
            bail!("Launcher shell exited with {}", status);
        }

        parse_pid(&output)
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        let raw = libc::pid_t::try_from(pid).map_err(|_| anyhow!("pid {} out of range", pid))?;
        if raw <= 0 {
            bail!("refusing to signal pid {}", pid);
        }

        signal::kill(Pid::from_raw(raw), Signal::SIGTERM)
            .with_context(|| format!("Failed to send SIGTERM to {}", pid))
    }
}

/// Pid printed by `echo $!`
pub fn parse_pid(output: &str) -> Result<u32> {
    let text = output.trim();
    let pid: u32 = text
        .parse()
        .with_context(|| format!("Launcher printed {:?} instead of a pid", text))?;
    if pid == 0 {
        bail!("Launcher printed pid 0");
    }
    Ok(pid)
}
