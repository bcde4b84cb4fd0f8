// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The logic watcher (§4.3, §4.6): an edge-triggered slot with no backing OS resource at
//! all. A hub registers one to represent purely in-process state transitions (a queue
//! depth crossing a threshold, a lease expiring) that hooks want dispatched through the
//! same `handle()` path as everything else instead of being special-cased in `loop_once`.

use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// Opaque application-defined payload delivered to [`crate::hooks::HubHooks::process_logic`].
/// The core never interprets this; it only carries it from `retain`/`trigger` to
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicEvent(pub u64);

#[derive(Debug)]
pub struct LogicWatcher {
    pub uid: Uid,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
    pending: Option<LogicEvent>,
}

impl LogicWatcher {
    #[must_use]
    pub fn new(uid: Uid) -> Self {
        Self { uid, flags: WatcherFlags::empty(), readiness: IoReadiness::empty(), pending: None }
    }

    /// Arms this watcher with an event and marks it readable; the reactor dispatches it
    /// on the next `loop_once` without ever touching `mio::Poll`.
    pub fn trigger(&mut self, event: LogicEvent) {
        self.pending = Some(event);
        self.readiness.insert(IoReadiness::IO_READ);
    }

    pub fn take_pending(&mut self) -> Option<LogicEvent> {
        self.readiness.remove(IoReadiness::IO_READ);
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_then_take_clears_readiness() {
        let mut watcher = LogicWatcher::new(Uid(7));
        watcher.trigger(LogicEvent(42));
        assert!(watcher.readiness.contains(IoReadiness::IO_READ));
        assert_eq!(watcher.take_pending(), Some(LogicEvent(42)));
        assert!(!watcher.readiness.contains(IoReadiness::IO_READ));
        assert_eq!(watcher.take_pending(), None);
    }
}
