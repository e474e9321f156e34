// SPDX-License-Identifier: GPL-3.0-only
//! HDMI hotplug event loop
//!
//! Single-threaded: the watcher owns the device, the last timing snapshot,
//! the pipeline slots and the debounce window, and alternates between a
//! blocking VIDIOC_DQEVENT and a short probe + reconcile step.
//!
//! ```text
//! Startup --probe/reconcile--> Waiting --source change--> Reacting
//!                                 ^                          |
//!                                 +--------------------------+
//! ```

mod debounce;

use std::time::Instant;

pub use debounce::Debouncer;

use crate::config::WatcherConfig;
use crate::error::{AppError, Result};
use crate::hdmi::{self, HdmiStatus, TimingsSnapshot};
use crate::pipeline::{PipelineHandle, PipelineManager, PipelineMode, ProcessLauncher};
use crate::v4l2::{CaptureDevice, DeviceEvent};

/// What handling one event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Not a source change event
    Ignored,
    /// Arrived inside the debounce window
    Debounced,
    /// Probe saw the same timings as before
    Unchanged,
    /// A pipeline was (re)started
    Activated(PipelineHandle),
    /// The pipeline for this mode could not be started; retried on the next event
    ActivationFailed(PipelineMode),
}

pub struct HdmiWatcher<D: CaptureDevice, L: ProcessLauncher> {
    device: D,
    snapshot: TimingsSnapshot,
    pipelines: PipelineManager<L>,
    debouncer: Debouncer,
}

impl<D: CaptureDevice, L: ProcessLauncher> HdmiWatcher<D, L> {
    pub fn new(device: D, launcher: L, config: &WatcherConfig) -> Self {
        Self {
            device,
            snapshot: TimingsSnapshot::new(),
            pipelines: PipelineManager::new(launcher, config.settle_delay),
            debouncer: Debouncer::new(config.debounce_interval),
        }
    }

    #[cfg(test)]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn pipelines(&self) -> &PipelineManager<L> {
        &self.pipelines
    }

    #[cfg(test)]
    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    /// Probe once and bring up the matching pipeline
    ///
    /// Does not open the debounce window, so the first event after startup is
    /// always handled.
    pub fn startup(&mut self) -> EventOutcome {
        let status = hdmi::probe(&self.device, &mut self.snapshot);
        match status {
            HdmiStatus::Connected => info!("HDMI cable already connected on startup"),
            HdmiStatus::Disconnected => info!("HDMI cable already disconnected on startup"),
            HdmiStatus::Unchanged => warn!("Startup probe reported no change"),
        }
        self.reconcile(status)
    }

    /// Ask the device for source change events
    pub fn subscribe(&self) -> Result<()> {
        self.device
            .subscribe_source_change()
            .map_err(AppError::Subscribe)?;
        info!("Subscribed to source change events");
        Ok(())
    }

    /// Block for the next event, retrying on EINTR/EAGAIN
    pub fn wait_for_event(&self) -> Result<DeviceEvent> {
        loop {
            match self.device.dequeue_event() {
                Ok(event) => return Ok(event),
                Err(e) if AppError::is_retryable_wait(&e) => {
                    debug!("Event wait interrupted ({}), waiting again", e);
                }
                Err(e) => return Err(AppError::DequeueEvent(e)),
            }
        }
    }

    /// React to one dequeued event received at `now`
    ///
    /// An accepted transition opens the debounce window once the handover
    /// (settle delay included) is over, so events queued meanwhile are
    /// still rejected.
    pub fn handle_event(&mut self, event: DeviceEvent, now: Instant) -> EventOutcome {
        let changes = match event {
            DeviceEvent::SourceChange { changes } => changes,
            DeviceEvent::Other(kind) => {
                debug!("Ignoring event type {}", kind);
                return EventOutcome::Ignored;
            }
        };

        info!("HDMI source change detected (changes: {:#x})", changes);

        if !self.debouncer.admits(now) {
            info!(
                "Source change ignored due to timeout ({:?} since last switch)",
                self.debouncer.elapsed(now).unwrap_or_default()
            );
            return EventOutcome::Debounced;
        }

        let status = hdmi::probe(&self.device, &mut self.snapshot);
        if status == HdmiStatus::Unchanged {
            info!("Source change without HDMI status change, nothing to do");
            return EventOutcome::Unchanged;
        }

        info!("HDMI cable {}", status);
        let outcome = self.reconcile(status);
        if matches!(outcome, EventOutcome::Activated(_)) {
            self.debouncer.accept(now.max(Instant::now()));
        }
        outcome
    }

    fn reconcile(&mut self, status: HdmiStatus) -> EventOutcome {
        let Some(mode) = status.pipeline_mode() else {
            return EventOutcome::Unchanged;
        };

        match self.pipelines.activate(mode) {
            Ok(handle) => EventOutcome::Activated(handle),
            Err(e) => {
                error!("{:#}", anyhow::Error::from(e));
                // Next probe must classify again so the launch is retried
                self.snapshot.invalidate();
                EventOutcome::ActivationFailed(mode)
            }
        }
    }

    /// Run until the event wait fails for good
    ///
    /// Returns the error that stopped the loop; logging it is up to the caller.
    pub fn run(&mut self) -> AppError {
        info!("HDMI hotplug monitoring started");

        loop {
            let event = match self.wait_for_event() {
                Ok(event) => event,
                Err(e) => return e,
            };

            let outcome = self.handle_event(event, Instant::now());
            debug!("Event handled: {:?}", outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hdmi::testing::FakeDevice;
    use crate::pipeline::testing::FakeLauncher;
    use crate::v4l2::sample_timings;

    const SOURCE_CHANGE: DeviceEvent = DeviceEvent::SourceChange { changes: 1 };

    fn watcher(device: FakeDevice) -> (HdmiWatcher<FakeDevice, FakeLauncher>, FakeLauncher) {
        let launcher = FakeLauncher::new();
        let config = WatcherConfig {
            settle_delay: Duration::ZERO,
            debounce_interval: Duration::from_millis(2000),
            ..WatcherConfig::default()
        };
        (HdmiWatcher::new(device, launcher.clone(), &config), launcher)
    }

    fn is_standby(cmd: &str) -> bool {
        cmd.contains("videotestsrc")
    }

    fn is_capture(cmd: &str) -> bool {
        cmd.contains("v4l2src")
    }

    #[test]
    fn test_startup_disconnected_launches_standby_once() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());

        let outcome = watcher.startup();
        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Disconnected, .. })));

        let spawned = launcher.spawned();
        assert_eq!(spawned.len(), 1);
        assert!(is_standby(&spawned[0]));
        assert_eq!(watcher.pipelines().handle(PipelineMode::Connected), None);
        assert!(launcher.terminated().is_empty());
    }

    #[test]
    fn test_startup_launch_failure_is_reported() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());
        launcher.state.borrow_mut().fail_spawn = true;

        assert_eq!(watcher.startup(), EventOutcome::ActivationFailed(PipelineMode::Disconnected));
        assert_eq!(watcher.pipelines().active_mode(), None);

        // The failed start is retried on the first source change
        launcher.state.borrow_mut().fail_spawn = false;
        let outcome = watcher.handle_event(SOURCE_CHANGE, Instant::now());
        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Disconnected, .. })));
    }

    #[test]
    fn test_startup_does_not_open_debounce_window() {
        let (mut watcher, _launcher) = watcher(FakeDevice::connected(sample_timings(720, 576)));
        watcher.startup();
        assert_eq!(watcher.debouncer().last_accepted(), None);
    }

    #[test]
    fn test_connected_then_disconnect_hands_over() {
        let (mut watcher, launcher) = watcher(FakeDevice::connected(sample_timings(720, 576)));
        watcher.startup();
        let capture_pid = watcher.pipelines().handle(PipelineMode::Connected).unwrap().pid;

        watcher.device().set_timings(None);
        let now = Instant::now();
        let outcome = watcher.handle_event(SOURCE_CHANGE, now);

        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Disconnected, .. })));
        assert_eq!(launcher.terminated(), vec![capture_pid]);
        let spawned = launcher.spawned();
        assert!(is_capture(&spawned[0]));
        assert!(is_standby(&spawned[1]));
        assert_eq!(watcher.pipelines().handle(PipelineMode::Connected), None);
        assert!(watcher.debouncer().last_accepted().is_some_and(|stamp| stamp >= now));
    }

    #[test]
    fn test_event_inside_window_is_discarded() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());
        watcher.startup();

        let t0 = Instant::now();
        watcher.device().set_timings(Some(sample_timings(720, 576)));
        assert!(matches!(watcher.handle_event(SOURCE_CHANGE, t0), EventOutcome::Activated(_)));
        let accepted = watcher.debouncer().last_accepted();

        watcher.device().set_timings(None);
        let queries_before = *watcher.device().queries.borrow();
        let spawned_before = launcher.spawned().len();

        let outcome = watcher.handle_event(SOURCE_CHANGE, t0 + Duration::from_millis(500));
        assert_eq!(outcome, EventOutcome::Debounced);
        assert_eq!(launcher.spawned().len(), spawned_before);
        assert_eq!(*watcher.device().queries.borrow(), queries_before);
        assert_eq!(watcher.debouncer().last_accepted(), accepted);
    }

    #[test]
    fn test_two_quick_events_reconcile_once() {
        let (mut watcher, launcher) = watcher(FakeDevice::connected(sample_timings(720, 576)));
        watcher.startup();
        assert_eq!(launcher.spawned().len(), 1);

        let t0 = Instant::now();
        watcher.device().set_timings(None);
        watcher.handle_event(SOURCE_CHANGE, t0);
        watcher.device().set_timings(Some(sample_timings(1280, 720)));
        watcher.handle_event(SOURCE_CHANGE, t0 + Duration::from_millis(100));

        assert_eq!(launcher.spawned().len(), 2);
        assert_eq!(watcher.pipelines().active_mode(), Some(PipelineMode::Disconnected));
    }

    #[test]
    fn test_unchanged_does_not_move_window() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());
        watcher.startup();

        let t0 = Instant::now();
        assert_eq!(watcher.handle_event(SOURCE_CHANGE, t0), EventOutcome::Unchanged);
        assert_eq!(watcher.debouncer().last_accepted(), None);

        // A real change right after is still handled
        watcher.device().set_timings(Some(sample_timings(720, 576)));
        let outcome = watcher.handle_event(SOURCE_CHANGE, t0 + Duration::from_millis(10));
        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Connected, .. })));
        assert_eq!(launcher.spawned().len(), 2);
    }

    #[test]
    fn test_event_after_window_is_handled() {
        let (mut watcher, _launcher) = watcher(FakeDevice::disconnected());
        watcher.startup();

        let t0 = Instant::now();
        watcher.device().set_timings(Some(sample_timings(720, 576)));
        watcher.handle_event(SOURCE_CHANGE, t0);

        watcher.device().set_timings(None);
        let outcome = watcher.handle_event(SOURCE_CHANGE, t0 + Duration::from_millis(2500));
        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Disconnected, .. })));
    }

    #[test]
    fn test_failed_launch_is_retried_on_next_event() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());
        watcher.startup();

        launcher.state.borrow_mut().fail_spawn = true;
        watcher.device().set_timings(Some(sample_timings(720, 576)));
        let t0 = Instant::now();
        assert_eq!(
            watcher.handle_event(SOURCE_CHANGE, t0),
            EventOutcome::ActivationFailed(PipelineMode::Connected)
        );
        assert_eq!(watcher.debouncer().last_accepted(), None);
        assert_eq!(watcher.pipelines().active_mode(), None);

        launcher.state.borrow_mut().fail_spawn = false;
        let outcome = watcher.handle_event(SOURCE_CHANGE, t0 + Duration::from_millis(50));
        assert!(matches!(outcome, EventOutcome::Activated(PipelineHandle { mode: PipelineMode::Connected, .. })));
    }

    #[test]
    fn test_events_queued_during_handover_are_debounced() {
        // Settle delay as long as the window: the second event of the burst is
        // dequeued only after the first handover has slept
        let device = FakeDevice::connected(sample_timings(720, 576));
        device.push_event(Ok(SOURCE_CHANGE));
        device.push_event(Ok(SOURCE_CHANGE));
        let launcher = FakeLauncher::new();
        let config = WatcherConfig {
            settle_delay: Duration::from_millis(300),
            debounce_interval: Duration::from_millis(300),
            ..WatcherConfig::default()
        };
        let mut watcher = HdmiWatcher::new(device, launcher.clone(), &config);
        watcher.startup();

        // First event finds the cable gone; the second would see a new mode
        watcher.device().set_timings(None);
        watcher.device().pending_timings.borrow_mut().push_back(Some(sample_timings(1280, 720)));

        assert!(matches!(watcher.run(), AppError::DequeueEvent(_)));

        let spawned = launcher.spawned();
        assert_eq!(spawned.len(), 2);
        assert!(is_capture(&spawned[0]));
        assert!(is_standby(&spawned[1]));
        assert_eq!(watcher.pipelines().active_mode(), Some(PipelineMode::Disconnected));
    }

    #[test]
    fn test_other_events_are_ignored() {
        let (mut watcher, launcher) = watcher(FakeDevice::disconnected());
        assert_eq!(watcher.handle_event(DeviceEvent::Other(3), Instant::now()), EventOutcome::Ignored);
        assert!(launcher.calls().is_empty());
    }

    #[test]
    fn test_subscribe_failure() {
        let device = FakeDevice::disconnected();
        *device.subscribe_error.borrow_mut() = Some(libc::EINVAL);
        let (watcher, _launcher) = watcher(device);
        assert!(matches!(watcher.subscribe(), Err(AppError::Subscribe(_))));
    }

    #[test]
    fn test_subscribe_success() {
        let (watcher, _launcher) = watcher(FakeDevice::disconnected());
        watcher.subscribe().unwrap();
        assert!(*watcher.device().subscribed.borrow());
    }

    #[test]
    fn test_wait_retries_interrupted_and_would_block() {
        let device = FakeDevice::disconnected();
        device.push_event(Err(std::io::Error::from_raw_os_error(libc::EINTR)));
        device.push_event(Err(std::io::Error::from_raw_os_error(libc::EAGAIN)));
        device.push_event(Ok(SOURCE_CHANGE));
        let (watcher, _launcher) = watcher(device);

        assert_eq!(watcher.wait_for_event().unwrap(), SOURCE_CHANGE);
    }

    #[test]
    fn test_run_stops_on_fatal_wait_error() {
        let device = FakeDevice::disconnected();
        device.push_event(Ok(SOURCE_CHANGE));
        device.push_event(Err(std::io::Error::from_raw_os_error(libc::EINTR)));
        device.push_event(Err(std::io::Error::from_raw_os_error(libc::ENODEV)));
        let (mut watcher, launcher) = watcher(device);
        watcher.startup();

        let err = watcher.run();
        match err {
            AppError::DequeueEvent(e) => assert_eq!(e.raw_os_error(), Some(libc::ENODEV)),
            other => panic!("unexpected error {:?}", other),
        }
        // The one source change found the device still disconnected
        assert_eq!(launcher.spawned().len(), 1);
    }
}
