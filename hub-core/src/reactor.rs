// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The single-threaded reactor (C1, §4.1, §5) wrapping `mio::Poll`. Every watcher's
//! `Uid` doubles as its `mio::Token`; the reactor never looks inside a [`Watcher`], it
//! only asks the registry what changed and stamps readiness bits back onto it.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use mio::event::Source;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};

use crate::error::{HubError, HubResult};
use crate::socket::IoReadiness;
use crate::watcher::Watcher;

fn interest_for(events: IoReadiness) -> Interest {
    match (events.contains(IoReadiness::IO_READ), events.contains(IoReadiness::IO_WRITE)) {
        (true, true) => Interest::READABLE.add(Interest::WRITABLE),
        (_, true) => Interest::WRITABLE,
        _ => Interest::READABLE,
    }
}

/// A negative fd is the mock sources' "no real fd" sentinel, not a registrable
/// descriptor.
fn valid_fd(fd: RawFd) -> Option<RawFd> { if fd >= 0 { Some(fd) } else { None } }

/// Returns the raw fd a watcher polls on, or `None` for kinds the reactor never
/// registers with `mio::Poll` directly: logic watchers (purely in-process), the
/// inotifier (delivers over a channel from its own background thread, drained
/// opportunistically rather than waited on), and sockets (transport ownership lives
/// outside the registry; ingress is driven explicitly each cycle, see `Hub::dispatch`).
fn raw_fd_of(watcher: &Watcher) -> Option<RawFd> {
    match watcher {
        Watcher::Alarm(w) => valid_fd(w.raw_fd),
        Watcher::Event(w) => valid_fd(w.raw_fd),
        Watcher::Interrupt(w) => valid_fd(w.raw_fd),
        Watcher::Inotifier(_) | Watcher::Logic(_) | Watcher::Socket(_) => None,
    }
}

#[derive(Debug)]
pub struct Reactor {
    poll: Poll,
    events: Events,
}

impl Reactor {
    pub fn new(max_io_events: usize) -> HubResult<Self> {
        let poll = Poll::new().map_err(HubError::from)?;
        Ok(Self { poll, events: Events::with_capacity(max_io_events.max(1)) })
    }

    /// Registers (or re-registers) a watcher's backing fd for the readiness it currently
    /// carries. A no-op for watchers with no backing fd (logic watchers, unregistered
    /// sockets).
    pub fn retain(&mut self, watcher: &Watcher) -> HubResult<()> {
        let Some(fd) = raw_fd_of(watcher) else { return Ok(()) };
        let token = Token(watcher.uid().get() as usize);
        let interest = interest_for(watcher.readiness());
        let registry = self.poll.registry();
        SourceFd(&fd)
            .register(registry, token, interest)
            .or_else(|_| SourceFd(&fd).reregister(registry, token, interest))
            .map_err(HubError::from)
    }

    /// Deregisters a watcher's fd. Errors are swallowed: a watcher being torn down
    /// because its fd already died is the common case, not an exception.
    pub fn disable(&mut self, watcher: &Watcher) {
        if let Some(fd) = raw_fd_of(watcher) {
            let _ = SourceFd(&fd).deregister(self.poll.registry());
        }
    }

    /// Blocks for readiness (or returns immediately if `block_if_idle` is `false`),
    /// returning the set of tokens (watcher UIDs) that became ready along with their
    /// readiness bits.
    pub fn poll(&mut self, block_if_idle: bool) -> HubResult<Vec<(u64, IoReadiness)>> {
        let timeout = if block_if_idle { None } else { Some(Duration::ZERO) };
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(HubError::from(e)),
        }
        let mut ready = Vec::new();
        for event in self.events.iter() {
            let mut readiness = IoReadiness::empty();
            if event.is_readable() {
                readiness.insert(IoReadiness::IO_READ);
            }
            if event.is_writable() {
                readiness.insert(IoReadiness::IO_WRITE);
            }
            if event.is_read_closed() || event.is_write_closed() || event.is_error() {
                readiness.insert(IoReadiness::IO_CLOSE);
            }
            ready.push((event.token().0 as u64, readiness));
        }
        Ok(ready)
    }
}

trait WatcherReadiness {
    fn readiness(&self) -> IoReadiness;
}

impl WatcherReadiness for Watcher {
    fn readiness(&self) -> IoReadiness {
        match self {
            Watcher::Socket(w) => w.readiness,
            Watcher::Alarm(w) => w.readiness,
            Watcher::Event(w) => w.readiness,
            Watcher::Inotifier(w) => w.readiness,
            Watcher::Interrupt(w) => w.readiness,
            Watcher::Logic(w) => w.readiness,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reactor_has_no_ready_events_without_registrations() {
        let mut reactor = Reactor::new(16).unwrap();
        let ready = reactor.poll(false).unwrap();
        assert!(ready.is_empty());
    }
}
