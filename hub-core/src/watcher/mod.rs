// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The watcher layer (§3, §4.3, §4.6): everything the reactor can hold a UID for.
//!
//! A [`Watcher`] is a tagged union rather than a trait object. The reactor only ever
//! needs to know "is this thing readable/writable/closed" and "dispatch to the right
//! hook"; a `match` on five-ish known variants is cheaper and easier to reason about
//! than virtual dispatch over a handful of implementors, and it keeps the singleton
//! notifiers (alarm, event, inotifier, interrupt) indistinguishable from sockets at the
//! registry layer.

pub mod alarm;
pub mod event;
pub mod inotifier;
pub mod interrupt;
pub mod logic;

use crate::socket::{IoReadiness, Socket};
use crate::types::Uid;
use alarm::AlarmWatcher;
use event::EventWatcher;
use inotifier::InotifierWatcher;
use interrupt::InterruptWatcher;
use logic::LogicWatcher;

bitflags::bitflags! {
    /// Flags shared by every watcher kind, socket or otherwise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WatcherFlags: u8 {
        /// Registered with the reactor and eligible for dispatch.
        const WATCHER_ACTIVE = 0b01;
        /// Currently polling for write-readiness in addition to read-readiness.
        const WATCHER_OUT    = 0b10;
    }
}

/// Everything the [`crate::registry::WatcherRegistry`] can hold under a UID.
#[derive(Debug)]
pub enum Watcher {
    Socket(Socket),
    Alarm(AlarmWatcher),
    Event(EventWatcher),
    Inotifier(InotifierWatcher),
    Interrupt(InterruptWatcher),
    Logic(LogicWatcher),
}

impl Watcher {
    #[must_use]
    pub fn uid(&self) -> Uid {
        match self {
            Watcher::Socket(w) => w.uid,
            Watcher::Alarm(w) => w.uid,
            Watcher::Event(w) => w.uid,
            Watcher::Inotifier(w) => w.uid,
            Watcher::Interrupt(w) => w.uid,
            Watcher::Logic(w) => w.uid,
        }
    }

    #[must_use]
    pub fn flags(&self) -> WatcherFlags {
        match self {
            Watcher::Socket(w) => w.flags,
            Watcher::Alarm(w) => w.flags,
            Watcher::Event(w) => w.flags,
            Watcher::Inotifier(w) => w.flags,
            Watcher::Interrupt(w) => w.flags,
            Watcher::Logic(w) => w.flags,
        }
    }

    pub fn set_flags(&mut self, flags: WatcherFlags) {
        match self {
            Watcher::Socket(w) => w.flags = flags,
            Watcher::Alarm(w) => w.flags = flags,
            Watcher::Event(w) => w.flags = flags,
            Watcher::Inotifier(w) => w.flags = flags,
            Watcher::Interrupt(w) => w.flags = flags,
            Watcher::Logic(w) => w.flags = flags,
        }
    }

    pub fn set_readiness(&mut self, readiness: IoReadiness) {
        match self {
            Watcher::Socket(w) => w.readiness = readiness,
            Watcher::Alarm(w) => w.readiness = readiness,
            Watcher::Event(w) => w.readiness = readiness,
            Watcher::Inotifier(w) => w.readiness = readiness,
            Watcher::Interrupt(w) => w.readiness = readiness,
            Watcher::Logic(w) => w.readiness = readiness,
        }
    }

    /// True for the five process-wide notifier singletons that [`crate::registry::WatcherRegistry::stop`]
    /// treats as fatal to lose. Listener and data sockets are not singletons even though
    /// there is usually exactly one listener.
    #[must_use]
    pub fn is_notifier_singleton(&self) -> bool {
        matches!(
            self,
            Watcher::Alarm(_) | Watcher::Event(_) | Watcher::Inotifier(_) | Watcher::Interrupt(_)
        )
    }

    #[must_use]
    pub fn as_socket(&self) -> Option<&Socket> {
        match self {
            Watcher::Socket(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_socket_mut(&mut self) -> Option<&mut Socket> {
        match self {
            Watcher::Socket(s) => Some(s),
            _ => None,
        }
    }
}
