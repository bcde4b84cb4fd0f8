// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Connection admission (§4.7): accepting new sockets into the temporary-connection ring
//! and sweeping that ring for promotions or timeouts. Both halves run from the listener
//! watcher's `handle()`, driven by the alarm tick for the sweep.

use std::collections::HashMap;
use std::time::Duration;

use crate::pool::Pool;
use crate::reactor::Reactor;
use crate::registry::WatcherRegistry;
use crate::socket::{IoReadiness, Socket, SocketType};
use crate::temp_ring::TemporaryConnectionRing;
use crate::transport::TransportProvider;
use crate::types::Uid;
use crate::watcher::Watcher;

/// Sweeps the temporary-connection ring oldest-first. Three outcomes per entry:
///
/// - the UID is no longer registered (the connection already died, or was already
///   promoted some other way) — discard silently, keep scanning.
/// - the UID is registered and has timed out — disable it, release its connection-pool
///   slot, drop its transport, and count it toward `target`, keep scanning.
/// - the UID is registered and has *not* timed out — stop the scan here; everything
///   behind it in the ring is even younger.
///
/// `target == 0` means "no cap, sweep the whole ring." `force` (used during `cleanup`)
/// treats every entry as timed out regardless of age. Returns the number of connections
/// disabled.
pub fn purge_temporary_connections(
    ring: &mut TemporaryConnectionRing,
    registry: &mut WatcherRegistry,
    reactor: &mut Reactor,
    connection_pool: &mut Pool<Uid>,
    transports: &mut HashMap<Uid, Box<dyn TransportProvider>>,
    timeout: Duration,
    target: usize,
    force: bool,
) -> usize {
    let mut disabled = 0;
    loop {
        if target != 0 && disabled >= target {
            break;
        }
        let Some(uid) = ring.peek_front() else { break };
        let Some(watcher) = registry.get(uid) else {
            ring.pop_front();
            continue;
        };
        let Some(socket) = watcher.as_socket() else {
            ring.pop_front();
            continue;
        };
        if !force && !socket.has_timed_out(timeout) {
            break;
        }
        ring.pop_front();
        release(registry, reactor, connection_pool, uid);
        transports.remove(&uid);
        disabled += 1;
    }
    disabled
}

fn release(registry: &mut WatcherRegistry, reactor: &mut Reactor, connection_pool: &mut Pool<Uid>, uid: Uid) {
    let Some(removed) = registry.stop(reactor, uid) else { return };
    if let Some(handle) = removed.as_socket().and_then(Socket::pool_handle) {
        connection_pool.release(handle);
    }
}

/// Accepts up to `max_new_connections` pending connections from `accept_one`, pooling
/// each as a temporary [`Socket`] and pushing its UID onto the ring. Sweeps the ring
/// first so a long-idle backlog doesn't block fresh accepts (§4.7 step 1).
/// `output_queue_limit` is the already-clamped per-socket queue size. A transport is only
/// retained in `transports` once the socket has been fully admitted — a failed attach or
/// a full ring drops it on the floor along with the rest of the half-built connection.
///
/// `accept_one` returns `Ok(None)` once there is nothing left to accept this cycle.
#[allow(clippy::too_many_arguments)]
pub fn accept_connections<E>(
    ring: &mut TemporaryConnectionRing,
    registry: &mut WatcherRegistry,
    reactor: &mut Reactor,
    connection_pool: &mut Pool<Uid>,
    transports: &mut HashMap<Uid, Box<dyn TransportProvider>>,
    timeout: Duration,
    max_new_connections: usize,
    output_queue_limit: usize,
    mut next_uid: impl FnMut() -> Uid,
    mut accept_one: impl FnMut() -> Result<Option<Box<dyn TransportProvider>>, E>,
) -> Result<usize, E> {
    purge_temporary_connections(ring, registry, reactor, connection_pool, transports, timeout, 0, false);

    let mut accepted = 0;
    while accepted < max_new_connections && ring.has_space() {
        if connection_pool.unallocated() == 0 {
            break;
        }
        let Some(transport) = accept_one()? else { break };
        let uid = next_uid();
        let Some(handle) = connection_pool.acquire(uid) else { break };
        let mut socket = Socket::new(uid, SocketType::empty(), output_queue_limit);
        socket.set_pool_handle(handle);
        if registry.attach(reactor, Watcher::Socket(socket), IoReadiness::IO_READ).is_err() {
            connection_pool.release(handle);
            continue;
        }
        if ring.push(uid).is_err() {
            release(registry, reactor, connection_pool, uid);
            continue;
        }
        transports.insert(uid, transport);
        accepted += 1;
    }
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (TemporaryConnectionRing, WatcherRegistry, Reactor, Pool<Uid>, HashMap<Uid, Box<dyn TransportProvider>>) {
        (TemporaryConnectionRing::new(8), WatcherRegistry::new(), Reactor::new(16).unwrap(), Pool::new(8), HashMap::new())
    }

    #[test]
    fn dangling_ring_entries_are_discarded_silently() {
        let (mut ring, mut registry, mut reactor, mut pool, mut transports) = setup();
        ring.push(Uid(99)).unwrap();
        let disabled = purge_temporary_connections(&mut ring, &mut registry, &mut reactor, &mut pool, &mut transports, Duration::ZERO, usize::MAX, false);
        assert_eq!(disabled, 0);
        assert!(ring.is_empty());
    }

    #[test]
    fn scan_stops_at_the_first_live_entry() {
        let (mut ring, mut registry, mut reactor, mut pool, mut transports) = setup();
        let timed_out = Socket::new(Uid(1), SocketType::empty(), 4);
        registry.attach(&mut reactor, Watcher::Socket(timed_out), IoReadiness::IO_READ).unwrap();
        let live = Socket::new(Uid(2), SocketType::empty(), 4);
        registry.attach(&mut reactor, Watcher::Socket(live), IoReadiness::IO_READ).unwrap();
        ring.push(Uid(1)).unwrap();
        ring.push(Uid(2)).unwrap();

        // timeout=0 would force everything timed out; use a generous timeout instead so
        // only the forced entry counts, simulated via `force` on just the first call.
        let disabled = purge_temporary_connections(&mut ring, &mut registry, &mut reactor, &mut pool, &mut transports, Duration::from_secs(3600), usize::MAX, false);
        assert_eq!(disabled, 0);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn forced_sweep_disables_every_entry() {
        let (mut ring, mut registry, mut reactor, mut pool, mut transports) = setup();
        let a_handle = pool.acquire(Uid(1)).unwrap();
        let b_handle = pool.acquire(Uid(2)).unwrap();
        let mut a = Socket::new(Uid(1), SocketType::empty(), 4);
        a.set_pool_handle(a_handle);
        let mut b = Socket::new(Uid(2), SocketType::empty(), 4);
        b.set_pool_handle(b_handle);
        registry.attach(&mut reactor, Watcher::Socket(a), IoReadiness::IO_READ).unwrap();
        registry.attach(&mut reactor, Watcher::Socket(b), IoReadiness::IO_READ).unwrap();
        ring.push(Uid(1)).unwrap();
        ring.push(Uid(2)).unwrap();

        let disabled = purge_temporary_connections(&mut ring, &mut registry, &mut reactor, &mut pool, &mut transports, Duration::ZERO, usize::MAX, true);
        assert_eq!(disabled, 2);
        assert!(ring.is_empty());
        assert_eq!(pool.unallocated(), 8);
    }

    #[test]
    fn accept_connections_retains_a_transport_only_on_full_success() {
        use crate::transport::LoopbackTransport;

        let (mut ring, mut registry, mut reactor, mut pool, mut transports) = setup();
        let mut next = 10u64;
        let mut pending = 2;
        let accepted = accept_connections(
            &mut ring,
            &mut registry,
            &mut reactor,
            &mut pool,
            &mut transports,
            Duration::from_secs(30),
            16,
            8,
            || { next += 1; Uid(next) },
            || -> Result<Option<Box<dyn TransportProvider>>, std::io::Error> {
                if pending == 0 {
                    return Ok(None);
                }
                pending -= 1;
                Ok(Some(Box::new(LoopbackTransport::new())))
            },
        )
        .unwrap();

        assert_eq!(accepted, 2);
        assert_eq!(transports.len(), 2);
        assert_eq!(pool.allocated(), 2);
        assert_eq!(ring.len(), 2);
    }
}
