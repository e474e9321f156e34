// SPDX-License-Identifier: GPL-3.0-only
//! Digital video timing descriptor
//!
//! Mirror of `struct v4l2_dv_timings`. The watcher never interprets the
//! fields beyond logging them; it only cares whether two snapshots are the
//! same bytes.

use std::fmt;
use std::mem::size_of;

/// `struct v4l2_bt_timings` (packed)
#[repr(C, packed)]
#[derive(Clone, Copy)]
#[allow(dead_code)] // kernel layout, most fields are only compared as bytes
pub struct BtTimings {
    pub width: u32,
    pub height: u32,
    pub interlaced: u32,
    pub polarities: u32,
    pub pixelclock: u64,
    pub hfrontporch: u32,
    pub hsync: u32,
    pub hbackporch: u32,
    pub vfrontporch: u32,
    pub vsync: u32,
    pub vbackporch: u32,
    pub il_vfrontporch: u32,
    pub il_vsync: u32,
    pub il_vbackporch: u32,
    pub standards: u32,
    pub flags: u32,
    pub picture_aspect: [u32; 2],
    pub cea861_vic: u8,
    pub hdmi_vic: u8,
    pub reserved: [u8; 46],
}

/// `struct v4l2_dv_timings` (packed)
///
/// The kernel union is `bt` or `reserved[32]`; the trailing bytes pad `bt`
/// up to the union's 128 bytes.
#[repr(C, packed)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
pub struct DvTimings {
    pub kind: u32,
    pub bt: BtTimings,
    union_tail: [u8; 4],
}

pub const DV_TIMINGS_SIZE: usize = size_of::<DvTimings>();

const _: () = assert!(DV_TIMINGS_SIZE == 132);

impl DvTimings {
    /// All-zero descriptor, also what a failed query reports
    pub fn zeroed() -> Self {
        Self::from_bytes(&[0; DV_TIMINGS_SIZE])
    }

    pub fn from_bytes(bytes: &[u8; DV_TIMINGS_SIZE]) -> Self {
        // Every field is a plain integer, so any byte pattern is valid
        unsafe { std::ptr::read_unaligned(bytes.as_ptr().cast::<Self>()) }
    }

    pub fn as_bytes(&self) -> &[u8; DV_TIMINGS_SIZE] {
        // Packed: alignment 1 and no padding bytes
        unsafe { &*(self as *const Self).cast::<[u8; DV_TIMINGS_SIZE]>() }
    }
}

/// Whether `current` is a different descriptor than `previous`
pub fn differs(previous: &DvTimings, current: &DvTimings) -> bool {
    previous.as_bytes() != current.as_bytes()
}

impl PartialEq for DvTimings {
    fn eq(&self, other: &Self) -> bool {
        !differs(self, other)
    }
}

impl Eq for DvTimings {}

impl Default for DvTimings {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl fmt::Debug for DvTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind;
        let width = self.bt.width;
        let height = self.bt.height;
        let pixelclock = self.bt.pixelclock;
        f.debug_struct("DvTimings")
            .field("kind", &kind)
            .field("width", &width)
            .field("height", &height)
            .field("pixelclock", &pixelclock)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DvTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bt = self.bt;
        let BtTimings {
            width,
            height,
            pixelclock,
            hfrontporch,
            hsync,
            hbackporch,
            vfrontporch,
            vsync,
            vbackporch,
            ..
        } = bt;
        let kind = self.kind;
        write!(
            f,
            "type {} {}x{} @ {} Hz, h fp/sync/bp {}/{}/{}, v fp/sync/bp {}/{}/{}",
            kind, width, height, pixelclock, hfrontporch, hsync, hbackporch, vfrontporch, vsync, vbackporch
        )
    }
}

#[cfg(test)]
pub(crate) fn sample_timings(width: u32, height: u32) -> DvTimings {
    let mut timings = DvTimings::zeroed();
    timings.kind = 0;
    timings.bt.width = width;
    timings.bt.height = height;
    timings.bt.pixelclock = 27_000_000;
    timings.bt.hfrontporch = 12;
    timings.bt.hsync = 64;
    timings.bt.hbackporch = 68;
    timings.bt.vfrontporch = 5;
    timings.bt.vsync = 5;
    timings.bt.vbackporch = 39;
    timings
}
