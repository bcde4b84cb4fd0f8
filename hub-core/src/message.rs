// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The pooled message frame (§3) and its flag bitset.

use crate::pool::Handle;
use crate::types::{Group, Uid};

/// Maximum frame length a [`Message`] payload may carry. Surfaced in [`crate::metrics`]
/// as part of the `HubInfo` snapshot.
pub const MTU: usize = 8192;

bitflags::bitflags! {
    /// Per-message flags. `PROCESSED` and `MARKED` are bookkeeping bits the pipeline
    /// manages; `TRAP` and `PRIORITY` are set by producers; `WAIT_PROCESSING` records
    /// that a message is queued for [`crate::publish::process_messages`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MessageFlags: u8 {
        /// Hand this message to the trap hook before routing; a trap hook that consumes
        /// it prevents forwarding entirely.
        const TRAP            = 0b0000_0001;
        /// Exempt from TTL-based random drop (see [`crate::publish::publish`]).
        const PRIORITY        = 0b0000_0010;
        /// Has already been through `route()` once; a second pass through
        /// [`crate::publish::process_messages`] skips re-routing.
        const PROCESSED       = 0b0000_0100;
        /// Queued on the inbound ring awaiting [`crate::publish::process_messages`].
        const WAIT_PROCESSING = 0b0000_1000;
        /// Resides inside some ring (inbound, outbound, or a socket's output queue).
        const MARKED          = 0b0001_0000;
    }
}

/// A pooled message frame. See §3 for the data-model invariants this type must uphold:
/// `length <= MTU`, `marked` iff queued, `hop_count` monotonically non-decreasing.
#[derive(Debug, Clone)]
pub struct Message {
    pub source: Uid,
    pub destination: Uid,
    pub group: Group,
    pub sequence: u64,
    pub flags: MessageFlags,
    pub hop_count: u32,
    pub payload: Vec<u8>,
    /// The message-pool slot this frame was allocated from, if any. `None` for messages
    /// built directly in tests without going through [`crate::ingress::ingress`].
    pool_handle: Option<Handle>,
}

impl Message {
    #[must_use]
    pub fn new(source: Uid, destination: Uid, payload: Vec<u8>) -> Self {
        Self {
            source,
            destination,
            group: Group::NONE,
            sequence: 0,
            flags: MessageFlags::empty(),
            hop_count: 0,
            payload,
            pool_handle: None,
        }
    }

    pub fn set_pool_handle(&mut self, handle: Handle) { self.pool_handle = Some(handle); }

    /// Removes and returns this message's pool handle, leaving it unset. Used at every
    /// pipeline exit that releases the slot back to the pool or hands it to a different
    /// owner (a socket's output queue no longer needs the message-pool accounting).
    pub fn take_pool_handle(&mut self) -> Option<Handle> { self.pool_handle.take() }

    #[must_use]
    pub fn length(&self) -> usize { self.payload.len() }

    #[must_use]
    pub fn is_marked(&self) -> bool { self.flags.contains(MessageFlags::MARKED) }

    pub fn set_marked(&mut self) { self.flags.insert(MessageFlags::MARKED); }

    pub fn clear_marked(&mut self) { self.flags.remove(MessageFlags::MARKED); }

    /// True only if the header fields are internally consistent: payload within MTU, and
    /// source/destination are set (a zero UID is a legal identity, so this only rejects
    /// the structurally impossible case of an oversized frame).
    #[must_use]
    pub fn validate(&self) -> bool { self.length() <= MTU }
}
