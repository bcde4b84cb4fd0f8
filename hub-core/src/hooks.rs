// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Pluggable business-logic hooks (C12) the core invokes but never implements itself.
//!
//! A production hub supplies its own [`HubHooks`] (a routing table, a trap policy for
//! registration-style messages, a periodic maintenance task). The bundled
//! [`NoopHooks`] is a pass-through suitable for the loopback scenarios in `tests/`.

use crate::message::Message;
use crate::types::Uid;
use crate::watcher::inotifier::InotifyEvent;
use crate::watcher::logic::LogicEvent;

/// Business-logic hooks invoked from the reactor loop. None of these may block — they
/// run on the single reactor thread between I/O readiness cycles.
pub trait HubHooks: Send {
    /// Called once per message with the `TRAP` flag set, before destination resolution.
    /// Return `true` to consume the message here (it is recycled, never forwarded).
    fn trap(&mut self, message: &Message) -> bool { let _ = message; false }

    /// Called once per freshly-arrived message (not already `PROCESSED`). Stamps
    /// `message.destination` (and any other fields the routing table decides); the
    /// message is then enqueued on the outbound ring regardless of what this does.
    fn route(&mut self, message: &mut Message) { let _ = message; }

    /// Called once per loop iteration, after `processMessages`.
    fn maintain(&mut self) {}

    fn process_alarm(&mut self, uid: Uid, ticks: u64) { let _ = (uid, ticks); }

    fn process_event(&mut self, uid: Uid, value: u64) { let _ = (uid, value); }

    fn process_inotification(&mut self, uid: Uid, event: &InotifyEvent) { let _ = (uid, event); }

    fn process_interrupt(&mut self, uid: Uid, signum: i32) { let _ = (uid, signum); }

    fn process_logic(&mut self, uid: Uid, event: LogicEvent) { let _ = (uid, event); }

    /// Whether [`crate::hub::Hub::setup`] should spawn the optional worker thread.
    fn enable_worker(&self) -> bool { false }

    /// Body of the optional worker thread. Runs until `should_stop` reads `true`. Must
    /// communicate back to the reactor only through the event notifier and `maintain`.
    fn do_work(&mut self, should_stop: &std::sync::atomic::AtomicBool) { let _ = should_stop; }
}

/// A [`HubHooks`] that routes nothing, traps nothing, and runs no worker. Used by the
/// default binary wiring and by tests that only care about the pipeline mechanics.
#[derive(Debug, Default)]
pub struct NoopHooks;

impl HubHooks for NoopHooks {}
