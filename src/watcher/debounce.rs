// SPDX-License-Identifier: GPL-3.0-only
//! Minimum-interval debounce for hotplug reactions

use std::time::{Duration, Instant};

/// Rejects events that arrive too soon after the last accepted one
///
/// Only accepted reactions move the window; rejected or no-op events do not.
#[derive(Debug, Clone)]
pub struct Debouncer {
    min_interval: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: None,
        }
    }

    /// Whether an event at `now` is outside the window
    pub fn admits(&self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Time since the last accepted reaction, if there was one
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        self.last_accepted.map(|last| now.saturating_duration_since(last))
    }

    pub fn accept(&mut self, now: Instant) {
        self.last_accepted = Some(now);
    }

    #[cfg(test)]
    pub fn last_accepted(&self) -> Option<Instant> {
        self.last_accepted
    }
}
