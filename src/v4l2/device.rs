// SPDX-License-Identifier: GPL-3.0-only
//! Real device node backed by the `nix` ioctl wrappers

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use super::ioctl::{
    self, EventSubscription, RawEvent, V4L2_EVENT_SOURCE_CHANGE, V4L2_EVENT_SRC_CH_RESOLUTION,
};
use super::{CaptureDevice, DeviceEvent, DvTimings};
use crate::error::{AppError, Result};

/// An opened `/dev/videoN` node
///
/// The file is opened blocking, so VIDIOC_DQEVENT sleeps until an event
/// arrives. Closing happens on drop.
pub struct V4l2Device {
    file: File,
    path: PathBuf,
}

impl V4l2Device {
    /// Open the device node read/write
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| AppError::DeviceOpen {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Opened video device {}", path.display());
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl CaptureDevice for V4l2Device {
    fn query_dv_timings(&self) -> std::io::Result<DvTimings> {
        let mut timings = DvTimings::zeroed();
        unsafe { ioctl::query_dv_timings(self.fd(), &mut timings) }?;
        Ok(timings)
    }

    fn subscribe_source_change(&self) -> std::io::Result<()> {
        let subscription = EventSubscription {
            kind: V4L2_EVENT_SOURCE_CHANGE,
            ..Default::default()
        };
        unsafe { ioctl::subscribe_event(self.fd(), &subscription) }?;
        Ok(())
    }

    fn dequeue_event(&self) -> std::io::Result<DeviceEvent> {
        let mut event = RawEvent::zeroed();
        unsafe { ioctl::dequeue_event(self.fd(), &mut event) }?;

        debug!(
            "Dequeued event type={} sequence={} pending={}",
            event.kind, event.sequence, event.pending
        );

        Ok(match event.kind {
            V4L2_EVENT_SOURCE_CHANGE => {
                let changes = event.source_changes();
                if changes & V4L2_EVENT_SRC_CH_RESOLUTION != 0 {
                    debug!("Driver flagged a resolution change");
                }
                DeviceEvent::SourceChange { changes }
            }
            other => DeviceEvent::Other(other),
        })
    }
}

impl std::fmt::Debug for V4l2Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V4l2Device({})", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_is_open_error() {
        let path = Path::new("/dev/hdmi-standby-does-not-exist");
        match V4l2Device::open(path) {
            Err(AppError::DeviceOpen { path: failed, source }) => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected DeviceOpen, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_ioctls_on_regular_file_fail() {
        // A plain file answers every V4L2 request with ENOTTY
        let path = std::env::temp_dir().join(format!("hdmi-standby-fake-dev-{}", std::process::id()));
        std::fs::write(&path, b"").expect("create temp file");
        let device = V4l2Device::open(&path).expect("open temp file");

        let err = device.query_dv_timings().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTTY));
        assert!(device.subscribe_source_change().is_err());
        assert!(device.dequeue_event().is_err());

        let _ = std::fs::remove_file(&path);
    }
}
