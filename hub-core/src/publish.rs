// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The publish/route pipeline (§4.9): `processMessages` drains the inbound ring through
//! `trap` and `route` exactly once per message, handing everything it doesn't consume to
//! the outbound ring; `publish` then drains the outbound ring under Answer-First-Priority
//! admission and TTL-based drop, either delivering to a destination socket or re-queuing
//! on inbound for the next cycle.

use std::collections::VecDeque;

use crate::hooks::HubHooks;
use crate::identity::IdentityProvider;
use crate::message::{Message, MessageFlags};
use crate::metrics::TrafficCounters;
use crate::pool::Pool;
use crate::reactor::Reactor;
use crate::registry::WatcherRegistry;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// Whether to admit a message under backpressure. Answer traffic (priority-flagged, or a
/// reply to something the hub itself originated) always gets the answer share of
/// capacity; forward traffic competes for what's left.
#[must_use]
pub fn afp_admit(is_answer_class: bool, answer_capacity_free: usize, forward_capacity_free: usize) -> bool {
    if is_answer_class {
        answer_capacity_free > 0
    } else {
        forward_capacity_free > 0
    }
}

/// Deterministic TTL-based drop decision (§4.9, §8): never drops priority traffic, and
/// only fires when packet drop is allowed at all; otherwise drops once the post-increment
/// hop count has gone *past* `message_ttl` — a message that lands exactly on the limit
/// still survives.
#[must_use]
pub fn should_ttl_drop(message: &Message, message_ttl: u32, allow_packet_drop: bool) -> bool {
    if !allow_packet_drop || message.flags.contains(MessageFlags::PRIORITY) {
        return false;
    }
    message.hop_count > message_ttl
}

fn recycle(message: &mut Message, message_pool: &mut Pool<()>) {
    if let Some(handle) = message.take_pool_handle() {
        message_pool.release(handle);
    }
}

/// Drains the inbound ring, running each unprocessed message through `trap` then
/// `route`, retaining the `PROCESSED` flag as an additive OR so a message that already
/// carried `TRAP`/`PRIORITY` keeps them (§9 Open Question: this non-clearing behavior is
/// preserved exactly, matching the flag semantics the pipeline relies on elsewhere).
/// Already-processed messages (re-queued by [`publish`] after a failed admission or a
/// full destination queue) skip straight to the outbound ring untouched. A message a trap
/// hook consumes is recycled here and never reaches `publish` at all.
pub fn process_messages(
    inbound: &mut VecDeque<Message>,
    outbound: &mut VecDeque<Message>,
    hooks: &mut dyn HubHooks,
    message_pool: &mut Pool<()>,
) {
    while let Some(mut message) = inbound.pop_front() {
        message.clear_marked();

        if !message.flags.contains(MessageFlags::PROCESSED) {
            if message.flags.contains(MessageFlags::TRAP) && hooks.trap(&message) {
                recycle(&mut message, message_pool);
                continue;
            }
            hooks.route(&mut message);
            message.flags.insert(MessageFlags::PROCESSED);
        }

        message.set_marked();
        outbound.push_back(message);
    }
}

/// Drains the outbound ring under Answer-First-Priority admission (§4.9 steps 1-4):
/// `capacity = message_pool_free + outbound.len()` (both computed once, up front, so the
/// ratios apply to what this cycle actually has to work with), split into an answer share
/// and a forward share. Per message: validate the frame, recycle silently if the
/// destination is this hub's own UID or isn't a registered socket (§8 scenario #2 — no
/// counters move for either case) or if the destination's group conflicts with the
/// message's, then check AFP admission. A message AFP rejects has its hop count bumped
/// and is TTL-drop-checked before being re-queued on `inbound` for the next cycle. A
/// message that clears admission is attempted exactly once against the destination's
/// output queue (§4.9 step 5); on success its message-pool handle is released and the
/// destination is re-armed for write-readiness if it's still waiting on one, on failure
/// (queue full) it goes back on `inbound` for retry next cycle — never a spin loop, since
/// the reactor is single-threaded and a stalled destination must not stall everything
/// else.
#[allow(clippy::too_many_arguments)]
pub fn publish(
    outbound: &mut VecDeque<Message>,
    inbound: &mut VecDeque<Message>,
    registry: &mut WatcherRegistry,
    reactor: &mut Reactor,
    message_pool: &mut Pool<()>,
    counters: &mut TrafficCounters,
    identity: &dyn IdentityProvider,
    self_uid: Uid,
    answer_ratio: f64,
    forward_ratio: f64,
    message_ttl: u32,
    allow_packet_drop: bool,
) {
    let capacity = message_pool.unallocated() + outbound.len();
    #[allow(clippy::cast_precision_loss)]
    let capacity_f = capacity as f64;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let mut answer_capacity_free = (capacity_f * answer_ratio).floor() as usize;
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let mut forward_capacity_free = (capacity_f * forward_ratio).floor() as usize;

    for mut message in outbound.drain(..).collect::<Vec<_>>() {
        if !message.validate() {
            counters.record_dropped(message.length());
            recycle(&mut message, message_pool);
            continue;
        }

        let Some(destination) = identity.resolve(message.destination) else {
            recycle(&mut message, message_pool);
            continue;
        };
        if destination == self_uid {
            recycle(&mut message, message_pool);
            continue;
        }
        let admissible = registry.get(destination).and_then(|w| w.as_socket()).is_some_and(|s| !s.group.conflicts_with(message.group));
        if !admissible {
            recycle(&mut message, message_pool);
            continue;
        }

        let is_answer_class = message.flags.contains(MessageFlags::PRIORITY);
        if !afp_admit(is_answer_class, answer_capacity_free, forward_capacity_free) {
            message.hop_count += 1;
            if should_ttl_drop(&message, message_ttl, allow_packet_drop) {
                counters.record_dropped(message.length());
                recycle(&mut message, message_pool);
            } else {
                inbound.push_back(message);
            }
            continue;
        }

        let handle = message.take_pool_handle();
        let socket = registry.get_mut(destination).and_then(|w| w.as_socket_mut()).expect("checked above");
        match socket.publish(message) {
            Ok(()) => {
                if is_answer_class {
                    answer_capacity_free -= 1;
                } else {
                    forward_capacity_free -= 1;
                }
                if let Some(handle) = handle {
                    message_pool.release(handle);
                }
                if let Some(watcher) = registry.get(destination) {
                    if watcher.as_socket().is_some_and(|s| s.test_flags(WatcherFlags::WATCHER_OUT)) {
                        let _ = reactor.retain(watcher);
                    }
                }
            }
            Err(mut returned) => {
                if let Some(handle) = handle {
                    returned.set_pool_handle(handle);
                }
                inbound.push_back(returned);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::NoopHooks;
    use crate::identity::IdentityMapping;
    use crate::socket::{Socket, SocketType};
    use crate::types::Group;
    use crate::watcher::Watcher;

    fn setup() -> (WatcherRegistry, Reactor, Pool<()>) {
        (WatcherRegistry::new(), Reactor::new(8).unwrap(), Pool::new(8))
    }

    #[test]
    fn priority_messages_are_never_ttl_dropped() {
        let mut m = Message::new(Uid(1), Uid(2), vec![]);
        m.flags.insert(MessageFlags::PRIORITY);
        m.hop_count = 100;
        assert!(!should_ttl_drop(&m, 1, true));
    }

    #[test]
    fn ttl_drop_requires_hop_count_strictly_past_the_limit() {
        let mut m = Message::new(Uid(1), Uid(2), vec![]);
        m.hop_count = 5;
        assert!(!should_ttl_drop(&m, 5, false));
        assert!(!should_ttl_drop(&m, 5, true));
        m.hop_count = 6;
        assert!(should_ttl_drop(&m, 5, true));
    }

    #[test]
    fn process_messages_sets_processed_additively() {
        let mut inbound = VecDeque::new();
        let mut outbound = VecDeque::new();
        let mut m = Message::new(Uid(1), Uid(2), vec![1]);
        m.flags.insert(MessageFlags::TRAP);
        inbound.push_back(m);

        let mut hooks = NoopHooks;
        let mut pool: Pool<()> = Pool::new(4);
        process_messages(&mut inbound, &mut outbound, &mut hooks, &mut pool);

        assert_eq!(outbound.len(), 1);
        let queued = &outbound[0];
        assert!(queued.flags.contains(MessageFlags::TRAP));
        assert!(queued.flags.contains(MessageFlags::PROCESSED));
    }

    #[test]
    fn trapped_message_never_reaches_outbound() {
        struct TrapAll;
        impl HubHooks for TrapAll {
            fn trap(&mut self, _message: &Message) -> bool { true }
        }
        let mut inbound = VecDeque::new();
        let mut outbound = VecDeque::new();
        let mut m = Message::new(Uid(1), Uid(2), vec![]);
        m.flags.insert(MessageFlags::TRAP);
        inbound.push_back(m);

        let mut hooks = TrapAll;
        let mut pool: Pool<()> = Pool::new(4);
        process_messages(&mut inbound, &mut outbound, &mut hooks, &mut pool);
        assert!(outbound.is_empty());
    }

    #[test]
    fn message_routed_to_self_uid_is_recycled_with_no_counters_moved() {
        let (mut registry, mut reactor, mut pool) = setup();
        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        outbound.push_back(Message::new(Uid(1), Uid(9), vec![1, 2, 3]));

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(9), 0.5, 0.0, 8, true);

        assert_eq!(counters.received.units, 0);
        assert_eq!(counters.dropped.units, 0);
        assert!(inbound.is_empty());
        assert!(outbound.is_empty());
    }

    #[test]
    fn unreachable_destination_is_recycled_with_no_counters_moved() {
        let (mut registry, mut reactor, mut pool) = setup();
        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        outbound.push_back(Message::new(Uid(1), Uid(404), vec![1, 2]));

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(0), 0.5, 0.0, 8, true);

        assert_eq!(counters.received.units, 0);
        assert_eq!(counters.dropped.units, 0);
    }

    #[test]
    fn group_conflict_is_recycled_with_no_counters_moved() {
        let (mut registry, mut reactor, mut pool) = setup();
        let mut dest = Socket::new(Uid(2), SocketType::empty(), 4);
        dest.group = Group(1);
        registry.attach(&mut reactor, Watcher::Socket(dest), crate::socket::IoReadiness::IO_READ).unwrap();

        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        let mut message = Message::new(Uid(1), Uid(2), vec![1]);
        message.group = Group(2);
        outbound.push_back(message);

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(0), 0.5, 0.0, 8, true);

        assert_eq!(counters.dropped.units, 0);
        assert!(inbound.is_empty());
    }

    #[test]
    fn admitted_message_is_delivered_and_releases_its_pool_handle() {
        let (mut registry, mut reactor, mut pool) = setup();
        let dest = Socket::new(Uid(2), SocketType::empty(), 4);
        registry.attach(&mut reactor, Watcher::Socket(dest), crate::socket::IoReadiness::IO_READ).unwrap();

        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        let handle = pool.acquire(()).unwrap();
        let mut message = Message::new(Uid(1), Uid(2), vec![9]);
        message.set_pool_handle(handle);
        outbound.push_back(message);

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(0), 1.0, 1.0, 8, true);

        assert_eq!(pool.allocated(), 0);
        assert!(inbound.is_empty());
    }

    #[test]
    fn capacity_exhausted_message_is_requeued_on_inbound_not_spun_on() {
        let (mut registry, mut reactor, mut pool) = setup();
        let dest = Socket::new(Uid(2), SocketType::empty(), 4);
        registry.attach(&mut reactor, Watcher::Socket(dest), crate::socket::IoReadiness::IO_READ).unwrap();

        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        outbound.push_back(Message::new(Uid(1), Uid(2), vec![1]));

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        // Zero ratios starve both classes of capacity regardless of pool headroom.
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(0), 0.0, 0.0, 8, true);

        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].hop_count, 1);
        assert_eq!(counters.dropped.units, 0);
    }

    #[test]
    fn full_destination_queue_requeues_instead_of_dropping() {
        let (mut registry, mut reactor, mut pool) = setup();
        let mut dest = Socket::new(Uid(2), SocketType::empty(), 1);
        dest.publish(Message::new(Uid(0), Uid(2), vec![0])).unwrap();
        registry.attach(&mut reactor, Watcher::Socket(dest), crate::socket::IoReadiness::IO_READ).unwrap();

        let mut outbound = VecDeque::new();
        let mut inbound = VecDeque::new();
        outbound.push_back(Message::new(Uid(1), Uid(2), vec![1]));

        let identity = IdentityMapping;
        let mut counters = TrafficCounters::new();
        publish(&mut outbound, &mut inbound, &mut registry, &mut reactor, &mut pool, &mut counters, &identity, Uid(0), 1.0, 1.0, 8, true);

        assert_eq!(inbound.len(), 1);
        assert_eq!(counters.received.units, 0);
        assert_eq!(counters.dropped.units, 0);
    }
}
