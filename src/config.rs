// SPDX-License-Identifier: GPL-3.0-only
//! Build-time settings
//!
//! Nothing here is read from disk or the environment; the daemon drives one
//! fixed capture device into one fixed framebuffer mode.

use std::path::PathBuf;
use std::time::Duration;

/// Capture device watched for HDMI source changes
pub const DEVICE_PATH: &str = "/dev/video0";

/// Minimum time between two accepted hotplug reactions
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(2);

/// Time given to a freshly launched pipeline before handling the next event
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Renderer program, looked up on PATH at launch time
pub const RENDERER_BINARY: &str = "gst-launch-1.0";

/// Framebuffer output geometry
pub const OUTPUT_WIDTH: u32 = 720;
pub const OUTPUT_HEIGHT: u32 = 576;
pub const CAPTURE_FRAMERATE: u32 = 60;

/// Audio passthrough format
pub const AUDIO_RATE: u32 = 48_000;
pub const AUDIO_CHANNELS: u32 = 2;

/// Text shown over the standby pattern
pub const STANDBY_MESSAGE: &str = "Please Stand By";
pub const STANDBY_FONT: &str = "VCR OSD Mono, 32";

/// Lock file name inside the runtime directory
pub const LOCK_FILE_NAME: &str = "hdmi-standby.lock";

/// Settings handed to the watcher
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    pub device_path: PathBuf,
    pub debounce_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEVICE_PATH),
            debounce_interval: DEBOUNCE_INTERVAL,
            settle_delay: SETTLE_DELAY,
        }
    }
}

/// Where the single-instance lock lives
///
/// Falls back to /tmp when no runtime dir is set (e.g. a system service).
pub fn lock_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(LOCK_FILE_NAME)
}
