// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The event notifier (C10, §4.6): the wakeup channel the optional worker thread (and
//! `Hub::react`) use to nudge the reactor outside of its own poll cycle. Exactly one
//! `eventfd`-style counter per hub; writes are coalesced by the kernel, so readers only
//! ever learn "something happened," not how many times.

use std::io;
#[cfg(unix)]
use std::os::fd::FromRawFd;
use std::os::fd::RawFd;

use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// Source of wakeup notifications. `notify()` is the write side (callable from any
/// thread); `read_value()` is the reactor's read side.
pub trait EventSource: Send {
    fn raw_fd(&self) -> RawFd;
    fn read_value(&mut self) -> io::Result<u64>;

    /// A cloneable handle the worker thread and `Hub::react` can use to wake the
    /// reactor. Boxed because the concrete type (an `eventfd` dup) isn't nameable here.
    fn notifier(&self) -> Box<dyn Fn() -> io::Result<()> + Send + Sync>;
}

#[cfg(unix)]
#[derive(Debug)]
pub struct EventFdSource {
    fd: nix::sys::eventfd::EventFd,
}

#[cfg(unix)]
impl EventFdSource {
    pub fn new() -> io::Result<Self> {
        let fd = nix::sys::eventfd::EventFd::from_flags(nix::sys::eventfd::EfdFlags::EFD_NONBLOCK)
            .map_err(io::Error::from)?;
        Ok(Self { fd })
    }
}

#[cfg(unix)]
impl EventSource for EventFdSource {
    fn raw_fd(&self) -> RawFd { std::os::fd::AsRawFd::as_raw_fd(&self.fd) }

    fn read_value(&mut self) -> io::Result<u64> {
        match self.fd.read() {
            Ok(v) => Ok(v),
            Err(nix::errno::Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn notifier(&self) -> Box<dyn Fn() -> io::Result<()> + Send + Sync> {
        let raw = std::os::fd::AsRawFd::as_raw_fd(&self.fd);
        Box::new(move || {
            let dup = nix::unistd::dup(raw).map_err(io::Error::from)?;
            let owned = unsafe { std::os::fd::OwnedFd::from_raw_fd(dup) };
            nix::unistd::write(&owned, &1u64.to_ne_bytes()).map_err(io::Error::from)?;
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct EventWatcher {
    pub uid: Uid,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
    pub raw_fd: RawFd,
}

impl EventWatcher {
    #[must_use]
    pub fn new(uid: Uid, raw_fd: RawFd) -> Self {
        Self { uid, flags: WatcherFlags::empty(), readiness: IoReadiness::empty(), raw_fd }
    }
}

/// In-process source for tests: a shared atomic counter stands in for the kernel object.
#[derive(Debug, Clone, Default)]
pub struct MockEventSource {
    pending: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl EventSource for MockEventSource {
    fn raw_fd(&self) -> RawFd { -1 }

    fn read_value(&mut self) -> io::Result<u64> {
        Ok(self.pending.swap(0, std::sync::atomic::Ordering::AcqRel))
    }

    fn notifier(&self) -> Box<dyn Fn() -> io::Result<()> + Send + Sync> {
        let pending = self.pending.clone();
        Box::new(move || {
            pending.fetch_add(1, std::sync::atomic::Ordering::AcqRel);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_source_accumulates_then_drains() {
        let mut source = MockEventSource::default();
        let notify = source.notifier();
        notify().unwrap();
        notify().unwrap();
        assert_eq!(source.read_value().unwrap(), 2);
        assert_eq!(source.read_value().unwrap(), 0);
    }
}
