// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Construction and rollback of the five singleton notifiers (§4.6). All five come up
//! together during `configure`, or none do: a hub that's missing any one of them can't
//! make progress, so a partial failure here tears down what was already built instead of
//! leaving the hub half-wired.

use crate::error::HubResult;
use crate::types::Uid;
use crate::watcher::alarm::{AlarmSource, AlarmWatcher};
use crate::watcher::event::{EventSource, EventWatcher};
use crate::watcher::inotifier::{InotifierSource, InotifierWatcher};
use crate::watcher::interrupt::{InterruptSource, InterruptWatcher};
use crate::watcher::logic::LogicWatcher;

/// UID convention: the hub's own singleton notifiers sit at fixed low UIDs so hooks can
/// recognize them without a lookup (`processAlarm(uid, ..)` etc. always see these).
pub const ALARM_UID: Uid = Uid(1);
pub const EVENT_UID: Uid = Uid(2);
pub const INOTIFIER_UID: Uid = Uid(3);
pub const INTERRUPT_UID: Uid = Uid(4);
pub const MAINTENANCE_LOGIC_UID: Uid = Uid(5);

/// The OS-resource end of each notifier. Outlives `setup()`: the `Hub` keeps this around
/// for the lifetime of the run, reading from it every time the matching watcher fires.
pub struct NotifierSources {
    pub alarm: Box<dyn AlarmSource>,
    pub event: Box<dyn EventSource>,
    pub inotifier: Box<dyn InotifierSource>,
    pub interrupt: Box<dyn InterruptSource>,
}

impl std::fmt::Debug for NotifierSources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierSources").finish_non_exhaustive()
    }
}

impl NotifierSources {
    /// A handle the worker thread (or anything else) can call to wake the reactor,
    /// satisfying the `Hub::react` contract (§4.11) without exposing the event source
    /// itself outside the hub.
    #[must_use]
    pub fn wakeup_handle(&self) -> Box<dyn Fn() -> std::io::Result<()> + Send + Sync> {
        self.event.notifier()
    }
}

/// The registry-facing records for each singleton, plus the maintenance logic watcher.
/// Consumed exactly once by `Hub::setup`, which moves each field into the registry.
#[derive(Debug)]
pub struct NotifierWatchers {
    pub alarm: AlarmWatcher,
    pub event: EventWatcher,
    pub inotifier: InotifierWatcher,
    pub interrupt: InterruptWatcher,
    pub maintenance_logic: LogicWatcher,
}

/// Built once in `configure`; splits into sources (kept by `Hub` for the run's duration)
/// and watchers (moved into the registry by `setup`).
#[derive(Debug)]
pub struct NotifierSet {
    pub sources: NotifierSources,
    pub watchers: NotifierWatchers,
}

impl NotifierSet {
    /// Assembles the notifier set from already-constructed sources. Construction of the
    /// sources themselves (which may fail on OS resource exhaustion) is the caller's
    /// responsibility so it can choose production or mock sources without this type
    /// knowing the difference.
    #[must_use]
    pub fn new(
        alarm: Box<dyn AlarmSource>,
        event: Box<dyn EventSource>,
        inotifier: Box<dyn InotifierSource>,
        interrupt: Box<dyn InterruptSource>,
    ) -> Self {
        // Raw fds are captured before the sources move into `NotifierSources` — the
        // watcher records need them for `Reactor::retain`, but don't otherwise touch the
        // source objects themselves.
        let alarm_fd = alarm.raw_fd();
        let event_fd = event.raw_fd();
        let interrupt_fd = interrupt.raw_fd();
        Self {
            sources: NotifierSources { alarm, event, inotifier, interrupt },
            watchers: NotifierWatchers {
                alarm: AlarmWatcher::new(ALARM_UID, alarm_fd),
                event: EventWatcher::new(EVENT_UID, event_fd),
                inotifier: InotifierWatcher::new(INOTIFIER_UID),
                interrupt: InterruptWatcher::new(INTERRUPT_UID, interrupt_fd),
                maintenance_logic: LogicWatcher::new(MAINTENANCE_LOGIC_UID),
            },
        }
    }
}

/// Builds the default, OS-backed notifier set. Kept separate from [`NotifierSet::new`]
/// so tests can substitute mocks without linking against real timerfd/eventfd/signalfd
/// resources.
#[cfg(unix)]
pub fn build_default(alarm_interval: std::time::Duration, watch_path: &std::path::Path, signals: &[i32]) -> HubResult<NotifierSet> {
    use crate::watcher::alarm::TimerFdSource;
    use crate::watcher::event::EventFdSource;
    use crate::watcher::inotifier::NotifyCrateSource;
    use crate::watcher::interrupt::SignalHookSource;

    let alarm = TimerFdSource::new(alarm_interval).map_err(crate::error::HubError::from)?;
    let event = EventFdSource::new().map_err(crate::error::HubError::from)?;
    let inotifier = NotifyCrateSource::new(watch_path).map_err(crate::error::HubError::from)?;
    let interrupt = SignalHookSource::new(signals).map_err(crate::error::HubError::from)?;
    Ok(NotifierSet::new(Box::new(alarm), Box::new(event), Box::new(inotifier), Box::new(interrupt)))
}
