// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The interrupt notifier (C8, §4.6): bridges `SIGINT`/`SIGTERM` (and any other signals
//! the caller registers) into the reactor as a readable fd, so shutdown is handled on
//! the same thread as everything else instead of in a signal handler.

use std::io;
use std::os::fd::RawFd;

use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

pub trait InterruptSource: Send {
    fn raw_fd(&self) -> RawFd;

    /// Drains pending signal numbers since the last read.
    fn read_signals(&mut self) -> io::Result<Vec<i32>>;
}

#[cfg(unix)]
pub struct SignalHookSource {
    registration: signal_hook_mio::v1_0::Signals,
}

#[cfg(unix)]
impl std::fmt::Debug for SignalHookSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalHookSource").finish_non_exhaustive()
    }
}

#[cfg(unix)]
impl SignalHookSource {
    pub fn new(signals: &[i32]) -> io::Result<Self> {
        let registration = signal_hook_mio::v1_0::Signals::new(signals)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self { registration })
    }
}

#[cfg(unix)]
impl InterruptSource for SignalHookSource {
    fn raw_fd(&self) -> RawFd { std::os::fd::AsRawFd::as_raw_fd(&self.registration) }

    fn read_signals(&mut self) -> io::Result<Vec<i32>> {
        Ok(self.registration.pending().collect())
    }
}

#[derive(Debug)]
pub struct InterruptWatcher {
    pub uid: Uid,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
    pub raw_fd: RawFd,
}

impl InterruptWatcher {
    #[must_use]
    pub fn new(uid: Uid, raw_fd: RawFd) -> Self {
        Self { uid, flags: WatcherFlags::empty(), readiness: IoReadiness::empty(), raw_fd }
    }
}

#[derive(Debug, Default)]
pub struct MockInterruptSource {
    pub queued: Vec<i32>,
}

impl InterruptSource for MockInterruptSource {
    fn raw_fd(&self) -> RawFd { -1 }

    fn read_signals(&mut self) -> io::Result<Vec<i32>> { Ok(std::mem::take(&mut self.queued)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_source_drains_once() {
        let mut source = MockInterruptSource { queued: vec![15] };
        assert_eq!(source.read_signals().unwrap(), vec![15]);
        assert!(source.read_signals().unwrap().is_empty());
    }
}
