// SPDX-License-Identifier: GPL-3.0-only
use std::process::ExitCode;

use crate::config::WatcherConfig;
use crate::error::AppError;
use crate::instance_lock::InstanceLock;
use crate::pipeline::ShellLauncher;
use crate::v4l2::V4l2Device;
use crate::watcher::{EventOutcome, HdmiWatcher};

#[macro_use]
extern crate tracing;

mod config;
mod error;
mod hdmi;
mod instance_lock;
mod pipeline;
mod v4l2;
mod watcher;

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "info,{}=info",
        env!("CARGO_CRATE_NAME")
    )));

    #[cfg(feature = "journald")]
    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
        return;
    }

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

fn main() -> ExitCode {
    setup_logs();

    let config = WatcherConfig::default();

    let lock = match InstanceLock::acquire(&config::lock_path()) {
        Ok(lock) => lock,
        Err(err @ AppError::AlreadyRunning { .. }) => {
            warn!("{}", err);
            return ExitCode::FAILURE;
        }
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    debug!("Holding instance lock {}", lock.path().display());

    let device = match V4l2Device::open(&config.device_path) {
        Ok(device) => device,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    info!("Watching {} for HDMI hotplug", device.path().display());

    let mut watcher = HdmiWatcher::new(device, ShellLauncher::new(), &config);

    match watcher.startup() {
        EventOutcome::Activated(handle) => info!("Initial {} pipeline is PID {}", handle.mode, handle.pid),
        EventOutcome::ActivationFailed(mode) => {
            warn!("Initial {} pipeline failed to start, retrying on the next source change", mode)
        }
        outcome => debug!("Startup probe: {:?}", outcome),
    }

    if let Err(err) = watcher.subscribe() {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    // Only returns once the device stops delivering events
    let err = watcher.run();
    error!("HDMI hotplug monitoring stopped: {}", err);
    if let Some(mode) = watcher.pipelines().active_mode() {
        info!("Leaving {} pipeline running", mode);
    }

    ExitCode::SUCCESS
}
