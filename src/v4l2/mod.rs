// SPDX-License-Identifier: GPL-3.0-only
//! V4L2 capture device access
//!
//! The watcher only needs three things from the driver: the current DV
//! timings, a source-change subscription and a blocking event queue. They
//! sit behind [`CaptureDevice`] so the event loop can run against a fake.

mod device;
mod ioctl;
mod timings;

pub use device::V4l2Device;
pub use timings::{DvTimings, differs};

#[cfg(test)]
pub(crate) use timings::sample_timings;

/// Event dequeued from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    /// V4L2_EVENT_SOURCE_CHANGE with its `changes` bitmask
    SourceChange { changes: u32 },
    /// Any other event type; not expected since only source changes are subscribed
    Other(u32),
}

/// Capability the watcher polls and waits on
pub trait CaptureDevice {
    /// VIDIOC_QUERY_DV_TIMINGS; an error means no valid source is present
    fn query_dv_timings(&self) -> std::io::Result<DvTimings>;

    /// Subscribe to V4L2_EVENT_SOURCE_CHANGE
    fn subscribe_source_change(&self) -> std::io::Result<()>;

    /// Block until the next event is available
    fn dequeue_event(&self) -> std::io::Result<DeviceEvent>;
}
