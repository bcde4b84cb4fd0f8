// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The watcher registry (§3, §4.4): the UID-to-[`Watcher`] map every other component
//! addresses watchers through. Registration and the reactor's epoll-equivalent
//! registration are kept in lockstep here so nothing can exist in one without the other.

use std::collections::HashMap;

use crate::error::{HubError, HubResult};
use crate::reactor::Reactor;
use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::Watcher;

#[derive(Debug)]
pub struct WatcherRegistry {
    watchers: HashMap<u64, Watcher>,
}

impl WatcherRegistry {
    #[must_use]
    pub fn new() -> Self { Self { watchers: HashMap::new() } }

    #[must_use]
    pub fn len(&self) -> usize { self.watchers.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.watchers.is_empty() }

    #[must_use]
    pub fn get(&self, uid: Uid) -> Option<&Watcher> { self.watchers.get(&uid.get()) }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut Watcher> { self.watchers.get_mut(&uid.get()) }

    pub fn iter(&self) -> impl Iterator<Item = &Watcher> { self.watchers.values() }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Watcher> { self.watchers.values_mut() }

    /// Registers `watcher` under its own UID and arms the reactor for `events`. Fails if
    /// the UID is already occupied — callers that intend to replace an existing entry
    /// must use [`WatcherRegistry::shift`] instead.
    pub fn attach(&mut self, reactor: &mut Reactor, mut watcher: Watcher, events: IoReadiness) -> HubResult<()> {
        let uid = watcher.uid();
        if self.watchers.contains_key(&uid.get()) {
            return Err(HubError::InvalidOperation { uid: uid.get() });
        }
        watcher.set_readiness(events);
        reactor.retain(&watcher)?;
        self.watchers.insert(uid.get(), watcher);
        Ok(())
    }

    /// Removes and returns a watcher without touching the reactor's registration; used
    /// when the caller is about to re-register it elsewhere (see [`WatcherRegistry::shift`]).
    pub fn detach(&mut self, uid: Uid) -> Option<Watcher> { self.watchers.remove(&uid.get()) }

    /// Moves whatever is registered at `from` onto `to`, disabling any distinct watcher
    /// already occupying `to`. No-op (beyond disabling the occupant) if `from` isn't
    /// registered. Mirrors the original's connection-promotion path: a temporary
    /// connection's UID is reassigned to a permanent slot in place.
    pub fn shift(&mut self, reactor: &mut Reactor, from: Uid, to: Uid) -> HubResult<()> {
        if from == to {
            return Ok(());
        }
        if let Some(occupant) = self.watchers.remove(&to.get()) {
            reactor.disable(&occupant);
        }
        let Some(mut watcher) = self.watchers.remove(&from.get()) else {
            return Ok(());
        };
        reactor.disable(&watcher);
        match &mut watcher {
            Watcher::Socket(s) => s.uid = to,
            Watcher::Alarm(w) => w.uid = to,
            Watcher::Event(w) => w.uid = to,
            Watcher::Inotifier(w) => w.uid = to,
            Watcher::Interrupt(w) => w.uid = to,
            Watcher::Logic(w) => w.uid = to,
        }
        reactor.retain(&watcher)?;
        self.watchers.insert(to.get(), watcher);
        Ok(())
    }

    /// Permanently removes a watcher, returning it so the caller can recover any
    /// resource it owned (a connection-pool handle, a transport). The four notifier
    /// singletons (alarm, event, inotifier, interrupt) are load-bearing: losing one
    /// mid-run leaves the reactor unable to make progress, so `stop` treats that case as
    /// fatal rather than quietly continuing (§4.6, §7).
    pub fn stop(&mut self, reactor: &mut Reactor, uid: Uid) -> Option<Watcher> {
        let watcher = self.watchers.remove(&uid.get())?;
        reactor.disable(&watcher);
        if watcher.is_notifier_singleton() {
            tracing::error!(uid = uid.get(), "notifier singleton stopped; aborting");
            std::process::abort();
        }
        Some(watcher)
    }
}

impl Default for WatcherRegistry {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::{Socket, SocketType};

    fn registry_with_socket(uid: u64) -> (WatcherRegistry, Reactor) {
        let mut reactor = Reactor::new(64).unwrap();
        let mut registry = WatcherRegistry::new();
        let socket = Socket::new(Uid(uid), SocketType::empty(), 8);
        registry.attach(&mut reactor, Watcher::Socket(socket), IoReadiness::IO_READ).unwrap();
        (registry, reactor)
    }

    #[test]
    fn attach_rejects_duplicate_uid() {
        let (mut registry, mut reactor) = registry_with_socket(1);
        let dup = Socket::new(Uid(1), SocketType::empty(), 8);
        assert!(registry.attach(&mut reactor, Watcher::Socket(dup), IoReadiness::IO_READ).is_err());
    }

    #[test]
    fn shift_moves_watcher_to_new_uid() {
        let (mut registry, mut reactor) = registry_with_socket(1);
        registry.shift(&mut reactor, Uid(1), Uid(2)).unwrap();
        assert!(registry.get(Uid(1)).is_none());
        assert_eq!(registry.get(Uid(2)).unwrap().uid(), Uid(2));
    }

    #[test]
    fn shift_displaces_existing_occupant_of_destination() {
        let (mut registry, mut reactor) = registry_with_socket(1);
        let other = Socket::new(Uid(2), SocketType::empty(), 8);
        registry.attach(&mut reactor, Watcher::Socket(other), IoReadiness::IO_READ).unwrap();
        registry.shift(&mut reactor, Uid(1), Uid(2)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(Uid(2)).unwrap().uid(), Uid(2));
    }
}
