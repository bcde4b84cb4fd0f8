// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The `Hub` (C1-C7, §4.1-§4.2, §4.11, §5): lifecycle state machine and the reactor
//! loop itself. Everything else in this crate is a collaborator `Hub` owns or calls
//! into; this module is where they're wired together.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::codec::FrameCodec;
use crate::config::ResolvedConfig;
use crate::error::{HubError, HubResult};
use crate::hooks::HubHooks;
use crate::identity::IdentityProvider;
use crate::message::Message;
use crate::metrics::{HubInfo, PoolOccupancy, TrafficCounters};
use crate::notifiers::{NotifierSet, NotifierSources};
use crate::pool::Pool;
use crate::reactor::Reactor;
use crate::registry::WatcherRegistry;
use crate::socket::Socket;
use crate::temp_ring::TemporaryConnectionRing;
use crate::transport::{TransportListener, TransportProvider};
use crate::types::Uid;
use crate::watcher::logic::LogicEvent;
use crate::watcher::Watcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Configured,
    Running,
    Stopping,
    Terminated,
}

/// Collaborators a `Hub` does not implement itself (§4.9, §4.14).
pub struct HubCollaborators {
    pub identity: Box<dyn IdentityProvider>,
    pub codec: Box<dyn FrameCodec>,
    pub hooks: Box<dyn HubHooks>,
    /// Accept side of the listening socket (§4.7, §4.14). `None` means the hub never
    /// originates new connections itself — a purely outbound or loopback-only hub.
    pub listener: Option<Box<dyn TransportListener>>,
}

impl std::fmt::Debug for HubCollaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubCollaborators").finish_non_exhaustive()
    }
}

/// The reactor and everything it touches. A `Hub` owns exactly one reactor thread's
/// worth of state; any worker thread communicates with it only through the event
/// notifier (§5).
pub struct Hub {
    state: LifecycleState,
    config: ResolvedConfig,
    collaborators: HubCollaborators,
    reactor: Reactor,
    registry: WatcherRegistry,
    pending_watchers: Option<crate::notifiers::NotifierWatchers>,
    notifier_sources: NotifierSources,
    connection_pool: Pool<Uid>,
    message_pool: Pool<()>,
    temp_ring: TemporaryConnectionRing,
    transports: HashMap<Uid, Box<dyn TransportProvider>>,
    inbound: VecDeque<Message>,
    outbound: VecDeque<Message>,
    counters: TrafficCounters,
    started_at: Instant,
    next_uid: u64,
    worker: Option<std::thread::JoinHandle<()>>,
    worker_stop: Arc<AtomicBool>,
    /// Set by `adapt`/`react` (§4.11): guards against a worker callback firing after the
    /// hub it was bound to has gone away. `react` only invokes its callback when this
    /// still points at the same hub it was given at `adapt` time.
    reference_token: Arc<AtomicBool>,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("state", &self.state)
            .field("connection_pool_allocated", &self.connection_pool.allocated())
            .field("connection_pool_capacity", &self.connection_pool.capacity())
            .finish_non_exhaustive()
    }
}

impl Hub {
    pub fn configure(config: ResolvedConfig, collaborators: HubCollaborators, notifiers: NotifierSet) -> HubResult<Self> {
        tracing::debug!(uid = config.uid, connection_pool_size = config.connection_pool_size, message_pool_size = config.message_pool_size, "hub configured");

        let reactor = Reactor::new(config.max_io_events)?;
        let connection_pool = Pool::new(config.connection_pool_size);
        let message_pool = Pool::new(config.message_pool_size);
        let temp_ring = TemporaryConnectionRing::new(config.backlog);
        let NotifierSet { sources, watchers } = notifiers;

        Ok(Self {
            state: LifecycleState::Configured,
            config,
            collaborators,
            reactor,
            registry: WatcherRegistry::new(),
            pending_watchers: Some(watchers),
            notifier_sources: sources,
            connection_pool,
            message_pool,
            temp_ring,
            transports: HashMap::new(),
            inbound: VecDeque::new(),
            outbound: VecDeque::new(),
            counters: TrafficCounters::new(),
            started_at: Instant::now(),
            next_uid: 100,
            worker: None,
            worker_stop: Arc::new(AtomicBool::new(false)),
            reference_token: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Registers the notifier singletons with the reactor/registry and spawns the
    /// optional worker thread if `hooks.enable_worker()` says to. Fails (and leaves
    /// nothing attached) if any singleton can't be registered (§4.6).
    pub fn setup(&mut self) -> HubResult<()> {
        let watchers = self.pending_watchers.take().ok_or(HubError::InvalidOperation { uid: self.config.uid })?;

        use crate::socket::IoReadiness;
        self.registry.attach(&mut self.reactor, Watcher::Alarm(watchers.alarm), IoReadiness::IO_READ)?;
        self.registry.attach(&mut self.reactor, Watcher::Event(watchers.event), IoReadiness::IO_READ)?;
        self.registry.attach(&mut self.reactor, Watcher::Inotifier(watchers.inotifier), IoReadiness::IO_READ)?;
        self.registry.attach(&mut self.reactor, Watcher::Interrupt(watchers.interrupt), IoReadiness::IO_READ)?;
        self.registry.attach(&mut self.reactor, Watcher::Logic(watchers.maintenance_logic), IoReadiness::empty())?;

        self.state = LifecycleState::Running;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState { self.state }

    #[must_use]
    pub fn uid(&self) -> Uid { Uid(self.config.uid) }

    /// Allocates a fresh connection UID. Monotonic for the process lifetime; never
    /// reused even after release, matching the original's never-reuse-while-running
    /// policy for connection identifiers.
    pub fn allocate_uid(&mut self) -> Uid {
        self.next_uid += 1;
        Uid(self.next_uid)
    }

    /// One reactor iteration, in the order §4.11 specifies: poll for readiness, publish
    /// whatever last cycle's `processMessages` staged on the outbound ring, dispatch this
    /// cycle's readiness (notifier ticks and socket ingress, which also refills inbound
    /// and accepts any new connections the listener is offering), route what just arrived
    /// through `processMessages` so it's ready for next cycle's publish pass, then run
    /// `maintain`. Blocks on `poll` only when neither ring has anything outstanding — a
    /// cycle with pending work never waits on I/O it doesn't need.
    pub fn loop_once(&mut self) -> HubResult<()> {
        let block = self.inbound.is_empty() && self.outbound.is_empty();
        let ready = self.reactor.poll(block)?;

        let own_uid = self.uid();
        crate::publish::publish(
            &mut self.outbound,
            &mut self.inbound,
            &mut self.registry,
            &mut self.reactor,
            &mut self.message_pool,
            &mut self.counters,
            self.collaborators.identity.as_ref(),
            own_uid,
            self.config.answer_ratio,
            self.config.forward_ratio,
            self.config.message_ttl,
            self.config.allow_packet_drop,
        );

        for (token, readiness) in ready {
            self.dispatch(Uid(token), readiness);
        }

        if let Err(error) = self.accept_from_listener() {
            tracing::warn!(?error, "accept_from_listener failed");
        }

        crate::publish::process_messages(&mut self.inbound, &mut self.outbound, self.collaborators.hooks.as_mut(), &mut self.message_pool);

        self.collaborators.hooks.maintain();
        Ok(())
    }

    fn dispatch(&mut self, uid: Uid, readiness: crate::socket::IoReadiness) {
        let Some(watcher) = self.registry.get_mut(uid) else { return };
        watcher.set_readiness(readiness);

        match watcher {
            Watcher::Alarm(_) => {
                if let Ok(ticks) = self.notifier_sources.alarm.read_ticks() {
                    self.collaborators.hooks.process_alarm(uid, ticks);
                }
                let target = self.config.max_new_connections;
                crate::admission::purge_temporary_connections(
                    &mut self.temp_ring,
                    &mut self.registry,
                    &mut self.reactor,
                    &mut self.connection_pool,
                    &mut self.transports,
                    self.config.connection_timeout,
                    target,
                    false,
                );
            }
            Watcher::Event(_) => {
                if let Ok(value) = self.notifier_sources.event.read_value() {
                    self.collaborators.hooks.process_event(uid, value);
                }
            }
            Watcher::Inotifier(_) => {
                while let Some(event) = self.notifier_sources.inotifier.try_recv() {
                    self.collaborators.hooks.process_inotification(uid, &event);
                }
            }
            Watcher::Interrupt(_) => {
                if let Ok(signals) = self.notifier_sources.interrupt.read_signals() {
                    for signum in signals {
                        self.collaborators.hooks.process_interrupt(uid, signum);
                    }
                }
                self.cancel();
            }
            Watcher::Logic(logic) => {
                if let Some(event) = logic.take_pending() {
                    self.collaborators.hooks.process_logic(uid, event);
                }
            }
            Watcher::Socket(_) => {
                self.drive_socket_ingress(uid);
            }
        }
    }

    /// Runs one ingress pass against the socket at `uid`, using whatever transport
    /// [`Hub::accept_from_listener`] associated with it. A closed transport releases the
    /// connection (registry, connection-pool slot, and the transport itself) rather than
    /// leaving a half-torn-down socket around.
    fn drive_socket_ingress(&mut self, uid: Uid) {
        let Some(mut transport) = self.transports.remove(&uid) else { return };

        let is_privileged = self.registry.get(uid).and_then(Watcher::as_socket).is_some_and(|s| s.is_overlay() || s.is_priority());
        let limit = if self.config.throttle {
            crate::throttle::cycle_limit(
                self.message_pool.unallocated(),
                self.config.reserved_messages,
                self.config.message_pool_size,
                is_privileged,
                is_privileged,
                self.config.cycle_input_limit,
            )
        } else {
            self.config.cycle_input_limit
        };

        let mut read_buffer = Vec::new();
        let outcome = match self.registry.get_mut(uid).and_then(Watcher::as_socket_mut) {
            Some(socket) => crate::ingress::ingress(
                socket,
                transport.as_mut(),
                self.collaborators.codec.as_mut(),
                &mut read_buffer,
                &mut self.inbound,
                &mut self.message_pool,
                &mut self.counters,
                limit,
            ),
            None => {
                self.transports.insert(uid, transport);
                return;
            }
        };

        if outcome.closed {
            self.release_connection(uid);
        } else {
            self.transports.insert(uid, transport);
        }
    }

    fn release_connection(&mut self, uid: Uid) {
        let Some(removed) = self.registry.stop(&mut self.reactor, uid) else { return };
        if let Some(handle) = removed.as_socket().and_then(Socket::pool_handle) {
            self.connection_pool.release(handle);
        }
        self.transports.remove(&uid);
    }

    /// Accepts as many pending connections as the configured listener currently offers,
    /// up to `max_new_connections`, sweeping the temporary-connection ring first (§4.7).
    /// A no-op if the hub isn't configured to listen, or has no listener collaborator at
    /// all.
    pub fn accept_from_listener(&mut self) -> HubResult<usize> {
        if !self.config.listen || self.config.max_new_connections == 0 {
            return Ok(0);
        }
        let Some(listener) = self.collaborators.listener.as_deref_mut() else { return Ok(0) };

        let mut next_uid = {
            let next = &mut self.next_uid;
            move || {
                *next += 1;
                Uid(*next)
            }
        };
        crate::admission::accept_connections(
            &mut self.temp_ring,
            &mut self.registry,
            &mut self.reactor,
            &mut self.connection_pool,
            &mut self.transports,
            self.config.connection_timeout,
            self.config.max_new_connections,
            self.config.output_queue_limit,
            &mut next_uid,
            || listener.accept(),
        )
        .map_err(HubError::from)
    }

    /// Triggers the maintenance logic watcher from outside the reactor thread — the
    /// worker-thread-facing half of the `adapt`/`react` contract (§4.11).
    pub fn react(&mut self, event: LogicEvent, reference: &Arc<AtomicBool>) {
        if !Arc::ptr_eq(reference, &self.reference_token) {
            return;
        }
        if let Some(Watcher::Logic(logic)) = self.registry.get_mut(crate::notifiers::MAINTENANCE_LOGIC_UID) {
            logic.trigger(event);
        }
    }

    /// Binds a worker-thread reference token, returning the wakeup handle and reference
    /// the worker should hold to call back into [`Hub::react`] safely (§4.11).
    #[must_use]
    pub fn adapt(&self) -> (Arc<AtomicBool>, Box<dyn Fn() -> std::io::Result<()> + Send + Sync>) {
        (self.reference_token.clone(), self.notifier_sources.wakeup_handle())
    }

    /// Spawns the optional worker thread if `hooks.enable_worker()` permits it.
    pub fn start_worker(&mut self, mut body: impl FnMut(&AtomicBool) + Send + 'static) {
        if !self.collaborators.hooks.enable_worker() || self.worker.is_some() {
            return;
        }
        let stop = self.worker_stop.clone();
        self.worker = Some(std::thread::spawn(move || body(&stop)));
    }

    pub fn stop_worker(&mut self) {
        self.worker_stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    /// Requests shutdown. Idempotent; the loop drains naturally once the caller stops
    /// calling `loop_once`.
    pub fn cancel(&mut self) {
        self.state = LifecycleState::Stopping;
    }

    #[must_use]
    pub fn is_running(&self) -> bool { self.state == LifecycleState::Running }

    pub fn cleanup(&mut self) {
        self.stop_worker();
        crate::admission::purge_temporary_connections(
            &mut self.temp_ring,
            &mut self.registry,
            &mut self.reactor,
            &mut self.connection_pool,
            &mut self.transports,
            self.config.connection_timeout,
            0,
            true,
        );
        self.state = LifecycleState::Terminated;
    }

    #[must_use]
    pub fn info(&self) -> HubInfo {
        HubInfo {
            uid: self.config.uid,
            uptime_secs: self.started_at.elapsed().as_secs(),
            traffic: self.counters,
            connection_pool: PoolOccupancy { size: self.connection_pool.capacity(), allocated: self.connection_pool.allocated() },
            message_pool: PoolOccupancy { size: self.message_pool.capacity(), allocated: self.message_pool.allocated() },
            mtu: crate::message::MTU,
            healthy: self.state != LifecycleState::Terminated,
        }
    }
}
