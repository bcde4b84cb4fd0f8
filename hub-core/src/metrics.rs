// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Traffic counters and the `HubInfo` snapshot (§3, §6): observability surface that
//! never feeds back into control flow. Counters are monotonic for the process lifetime;
//! nothing here is reset except by process restart.

use serde::Serialize;

/// Units and bytes moved in one direction. Both fields are independent monotonic
/// counters; `units` is message count, `bytes` is payload bytes only (headers excluded).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Throughput {
    pub units: u64,
    pub bytes: u64,
}

impl Throughput {
    fn record(&mut self, bytes: usize) {
        self.units += 1;
        self.bytes += bytes as u64;
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TrafficCounters {
    pub received: Throughput,
    pub dropped: Throughput,
}

impl TrafficCounters {
    #[must_use]
    pub fn new() -> Self { Self::default() }

    pub fn record_received(&mut self, bytes: usize) { self.received.record(bytes); }

    pub fn record_dropped(&mut self, bytes: usize) { self.dropped.record(bytes); }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PoolOccupancy {
    pub size: usize,
    pub allocated: usize,
}

/// A point-in-time snapshot of hub health, serializable for a status endpoint or a
/// periodic log line.
#[derive(Debug, Clone, Serialize)]
pub struct HubInfo {
    pub uid: u64,
    pub uptime_secs: u64,
    pub traffic: TrafficCounters,
    pub connection_pool: PoolOccupancy,
    pub message_pool: PoolOccupancy,
    pub mtu: usize,
    pub healthy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_tracks_units_and_bytes_independently() {
        let mut counters = TrafficCounters::new();
        counters.record_received(10);
        counters.record_received(5);
        counters.record_dropped(3);
        assert_eq!(counters.received.units, 2);
        assert_eq!(counters.received.bytes, 15);
        assert_eq!(counters.dropped.units, 1);
        assert_eq!(counters.dropped.bytes, 3);
    }
}
