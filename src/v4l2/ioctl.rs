// SPDX-License-Identifier: GPL-3.0-only
//! V4L2 ioctl wrappers and the kernel structs they carry
//!
//! Only the handful of requests the watcher needs. Layouts follow
//! `linux/videodev2.h`; request numbers are encoded by `nix` for the target
//! architecture.

use super::timings::DvTimings;

pub const V4L2_EVENT_SOURCE_CHANGE: u32 = 5;
pub const V4L2_EVENT_SRC_CH_RESOLUTION: u32 = 1;

const VIDIOC_MAGIC: u8 = b'V';
const VIDIOC_DQEVENT: u8 = 89;
const VIDIOC_SUBSCRIBE_EVENT: u8 = 90;
const VIDIOC_QUERY_DV_TIMINGS: u8 = 99;

nix::ioctl_read!(
    /// VIDIOC_DQEVENT
    dequeue_event,
    VIDIOC_MAGIC,
    VIDIOC_DQEVENT,
    RawEvent
);
nix::ioctl_write_ptr!(
    /// VIDIOC_SUBSCRIBE_EVENT
    subscribe_event,
    VIDIOC_MAGIC,
    VIDIOC_SUBSCRIBE_EVENT,
    EventSubscription
);
nix::ioctl_read!(
    /// VIDIOC_QUERY_DV_TIMINGS
    query_dv_timings,
    VIDIOC_MAGIC,
    VIDIOC_QUERY_DV_TIMINGS,
    DvTimings
);

/// `struct v4l2_event_subscription`
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
#[allow(dead_code)]
pub struct EventSubscription {
    pub kind: u32,
    pub id: u32,
    pub flags: u32,
    pub reserved: [u32; 5],
}

/// `struct v4l2_event`
///
/// The payload union holds 64 bytes and contains 64-bit members, hence the
/// `u64` array to get the same alignment as the kernel.
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub struct RawEvent {
    pub kind: u32,
    pub payload: [u64; 8],
    pub pending: u32,
    pub sequence: u32,
    pub timestamp: nix::libc::timespec,
    pub id: u32,
    pub reserved: [u32; 8],
}

impl RawEvent {
    pub fn zeroed() -> Self {
        Self {
            kind: 0,
            payload: [0; 8],
            pending: 0,
            sequence: 0,
            timestamp: nix::libc::timespec { tv_sec: 0, tv_nsec: 0 },
            id: 0,
            reserved: [0; 8],
        }
    }

    /// `u.src_change.changes`, the first u32 of the payload
    pub fn source_changes(&self) -> u32 {
        let b = self.payload[0].to_ne_bytes();
        u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
    }
}
