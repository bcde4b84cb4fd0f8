// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The alarm notifier (C9, §4.6): a periodic timer the hub polls itself with, used to
//! drive maintenance work (`purgeTemporaryConnections`, `maintain`) at a fixed cadence
//! even when no I/O is otherwise ready.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// Source of periodic tick events, abstracted so tests can drive the reactor without a
/// real kernel timer. The reactor registers `raw_fd()` directly with `mio::Poll`; this
/// trait only owns read-side semantics.
pub trait AlarmSource: Send {
    fn raw_fd(&self) -> RawFd;

    /// Consumes pending expirations and returns how many ticks fired since the last
    /// read. Called once per `IO_READ` dispatch.
    fn read_ticks(&mut self) -> io::Result<u64>;
}

/// `timerfd`-backed periodic source, armed at a fixed interval.
#[cfg(unix)]
#[derive(Debug)]
pub struct TimerFdSource {
    timer: nix::sys::timerfd::TimerFd,
}

#[cfg(unix)]
impl TimerFdSource {
    pub fn new(interval: Duration) -> io::Result<Self> {
        use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
        let timer = TimerFd::new(ClockId::CLOCK_MONOTONIC, TimerFlags::TFD_NONBLOCK)
            .map_err(io::Error::from)?;
        let spec = nix::sys::time::TimeSpec::from_duration(interval);
        timer
            .set(Expiration::IntervalDelayed(spec, spec), TimerSetTimeFlags::empty())
            .map_err(io::Error::from)?;
        Ok(Self { timer })
    }
}

#[cfg(unix)]
impl AlarmSource for TimerFdSource {
    fn raw_fd(&self) -> RawFd {
        std::os::fd::AsRawFd::as_raw_fd(&std::os::fd::AsFd::as_fd(&self.timer))
    }

    fn read_ticks(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        match nix::unistd::read(self.raw_fd(), &mut buf) {
            Ok(_) => Ok(u64::from_ne_bytes(buf)),
            Err(nix::errno::Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug)]
pub struct AlarmWatcher {
    pub uid: Uid,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
    pub raw_fd: RawFd,
}

impl AlarmWatcher {
    #[must_use]
    pub fn new(uid: Uid, raw_fd: RawFd) -> Self {
        Self { uid, flags: WatcherFlags::empty(), readiness: IoReadiness::empty(), raw_fd }
    }
}

/// A fixed-count source for tests: yields one tick per poll until exhausted.
#[derive(Debug, Default)]
pub struct MockAlarmSource {
    pub remaining_ticks: u64,
}

impl AlarmSource for MockAlarmSource {
    fn raw_fd(&self) -> RawFd { -1 }

    fn read_ticks(&mut self) -> io::Result<u64> {
        if self.remaining_ticks == 0 {
            return Ok(0);
        }
        self.remaining_ticks -= 1;
        Ok(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_source_yields_one_tick_until_exhausted() {
        let mut source = MockAlarmSource { remaining_ticks: 2 };
        assert_eq!(source.read_ticks().unwrap(), 1);
        assert_eq!(source.read_ticks().unwrap(), 1);
        assert_eq!(source.read_ticks().unwrap(), 0);
    }
}
