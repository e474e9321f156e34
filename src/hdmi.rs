// SPDX-License-Identifier: GPL-3.0-only
//! HDMI source presence detection
//!
//! A successful DV timings query means a source is present, a failed one
//! means it is not. The last seen descriptor is kept so that repeated
//! reports of the same state classify as [`HdmiStatus::Unchanged`].

use std::fmt;

use crate::pipeline::PipelineMode;
use crate::v4l2::{CaptureDevice, DvTimings, differs};

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HdmiStatus {
    Connected,
    Disconnected,
    Unchanged,
}

impl HdmiStatus {
    /// Pipeline mode this status calls for, if any
    pub fn pipeline_mode(self) -> Option<PipelineMode> {
        match self {
            HdmiStatus::Connected => Some(PipelineMode::Connected),
            HdmiStatus::Disconnected => Some(PipelineMode::Disconnected),
            HdmiStatus::Unchanged => None,
        }
    }
}

impl fmt::Display for HdmiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HdmiStatus::Connected => write!(f, "connected"),
            HdmiStatus::Disconnected => write!(f, "disconnected"),
            HdmiStatus::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Last observed timing descriptor
///
/// Starts empty, so the very first probe always classifies as a change even
/// when the failed query reports an all-zero descriptor.
#[derive(Debug, Default, Clone)]
pub struct TimingsSnapshot {
    last: Option<DvTimings>,
}

impl TimingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&DvTimings> {
        self.last.as_ref()
    }

    /// Whether `current` differs from the stored descriptor
    pub fn differs_from(&self, current: &DvTimings) -> bool {
        match &self.last {
            Some(previous) => differs(previous, current),
            None => true,
        }
    }

    pub fn replace(&mut self, current: DvTimings) {
        self.last = Some(current);
    }

    /// Forget the stored descriptor so the next probe reports a change again
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}

/// Query the device and classify the result against `snapshot`
pub fn probe<D: CaptureDevice + ?Sized>(device: &D, snapshot: &mut TimingsSnapshot) -> HdmiStatus {
    let query = device.query_dv_timings();

    match &query {
        Ok(_) => debug!("VIDIOC_QUERY_DV_TIMINGS succeeded"),
        Err(e) => debug!("VIDIOC_QUERY_DV_TIMINGS failed: {}", e),
    }

    let connected = query.is_ok();
    let current = query.unwrap_or_default();

    if !snapshot.differs_from(&current) {
        debug!("No HDMI status change");
        return HdmiStatus::Unchanged;
    }

    info!("DV timings changed: {}", current);
    snapshot.replace(current);

    if connected {
        HdmiStatus::Connected
    } else {
        HdmiStatus::Disconnected
    }
}
