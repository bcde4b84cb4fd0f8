// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The data-connection [`Socket`] (§3): a pooled I/O endpoint with a bounded outbound
//! queue and a feed of already-decoded messages pulled off the wire by a
//! [`crate::codec::FrameCodec`].

use std::time::{Duration, Instant};

use crate::message::Message;
use crate::pool::Handle;
use crate::ring::BoundedRing;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// Upper bound on any socket's `outputQueueLimit`; configured limits are clamped below
/// this (see `hub::config::HubConfig::resolve`).
pub const OUT_QUEUE_SIZE: usize = 256;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SocketType: u8 {
        const LISTENER = 0b001;
        const OVERLAY  = 0b010;
        const PRIORITY = 0b100;
    }
}

bitflags::bitflags! {
    /// Readiness bits the reactor stamps onto a watcher before dispatch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoReadiness: u8 {
        const IO_READ  = 0b001;
        const IO_WRITE = 0b010;
        const IO_CLOSE = 0b100;
    }
}

/// A pooled data connection. Owns its outbound queue (capacity = `output_queue_limit`,
/// itself `< OUT_QUEUE_SIZE`) and a queue of frames the codec has already decoded and is
/// waiting to hand to [`crate::ingress::ingress`].
#[derive(Debug)]
pub struct Socket {
    pub uid: Uid,
    pub kind: SocketType,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
    pub group: crate::types::Group,
    output_queue: BoundedRing<Message>,
    decoded_feed: std::collections::VecDeque<Message>,
    created_at: Instant,
    /// The connection-pool slot this socket occupies, set once admission succeeds.
    pool_handle: Option<Handle>,
}

impl Socket {
    #[must_use]
    pub fn new(uid: Uid, kind: SocketType, output_queue_limit: usize) -> Self {
        Self {
            uid,
            kind,
            flags: WatcherFlags::empty(),
            readiness: IoReadiness::empty(),
            group: crate::types::Group::NONE,
            output_queue: BoundedRing::new(output_queue_limit.min(OUT_QUEUE_SIZE - 1)),
            decoded_feed: std::collections::VecDeque::new(),
            created_at: Instant::now(),
            pool_handle: None,
        }
    }

    #[must_use]
    pub fn pool_handle(&self) -> Option<Handle> { self.pool_handle }

    pub fn set_pool_handle(&mut self, handle: Handle) { self.pool_handle = Some(handle); }

    #[must_use]
    pub fn is_overlay(&self) -> bool { self.kind.contains(SocketType::OVERLAY) }

    #[must_use]
    pub fn is_priority(&self) -> bool { self.kind.contains(SocketType::PRIORITY) }

    #[must_use]
    pub fn is_listener(&self) -> bool { self.kind.contains(SocketType::LISTENER) }

    /// True once `timeout` has elapsed since the socket was accepted. `timeout == 0`
    /// means "always timed out" (used by a forced sweep).
    #[must_use]
    pub fn has_timed_out(&self, timeout: Duration) -> bool {
        timeout.is_zero() || self.created_at.elapsed() >= timeout
    }

    pub fn test_events(&self, mask: IoReadiness) -> bool { self.readiness.intersects(mask) }

    pub fn test_flags(&self, mask: WatcherFlags) -> bool { self.flags.intersects(mask) }

    /// Appends a decoded frame to the feed a codec has produced; consumed by
    /// [`crate::ingress::ingress`].
    pub fn feed_decoded(&mut self, message: Message) { self.decoded_feed.push_back(message); }

    #[must_use]
    pub fn decoded_available(&self) -> usize { self.decoded_feed.len() }

    pub fn pull_decoded(&mut self) -> Option<Message> { self.decoded_feed.pop_front() }

    /// Enqueues `message` on this socket's outbound queue. Returns `false` (message is
    /// returned to the caller) if the queue is full — the publish pipeline treats this as
    /// a retry-on-full signal, never a drop.
    pub fn publish(&mut self, message: Message) -> Result<(), Message> {
        self.output_queue.put(message)
    }

    #[must_use]
    pub fn output_queue_has_space(&self) -> bool { self.output_queue.has_space() }

    /// Drains as much of the outbound queue as the transport will currently accept.
    /// `write_one` returns `Ok(true)` if it accepted the message, `Ok(false)` if the
    /// transport is full (message goes back to the front of the queue), or `Err` on a
    /// hard I/O failure (caller disables the socket).
    pub fn flush_output<E>(
        &mut self,
        mut write_one: impl FnMut(&Message) -> Result<bool, E>,
    ) -> Result<(), E> {
        while let Some(message) = self.output_queue.get() {
            match write_one(&message) {
                Ok(true) => {}
                Ok(false) => {
                    // Transport can't take more right now; re-queue at the front isn't
                    // representable in a plain FIFO ring, so push to the back and stop —
                    // the reactor will re-arm IO_WRITE and we'll resume next cycle.
                    let _ = self.output_queue.put(message);
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_fails_once_output_queue_is_full() {
        let mut socket = Socket::new(Uid(1), SocketType::empty(), 1);
        assert!(socket.publish(Message::new(Uid(0), Uid(1), vec![])).is_ok());
        assert!(socket.publish(Message::new(Uid(0), Uid(1), vec![])).is_err());
    }

    #[test]
    fn output_queue_limit_is_clamped_below_out_queue_size() {
        let socket = Socket::new(Uid(1), SocketType::empty(), OUT_QUEUE_SIZE + 100);
        assert_eq!(socket.output_queue.capacity(), OUT_QUEUE_SIZE - 1);
    }

    #[test]
    fn zero_timeout_forces_timed_out() {
        let socket = Socket::new(Uid(1), SocketType::empty(), 4);
        assert!(socket.has_timed_out(Duration::ZERO));
    }

    #[test]
    fn decoded_feed_is_fifo() {
        let mut socket = Socket::new(Uid(1), SocketType::empty(), 4);
        socket.feed_decoded(Message::new(Uid(0), Uid(1), vec![1]));
        socket.feed_decoded(Message::new(Uid(0), Uid(1), vec![2]));
        assert_eq!(socket.pull_decoded().unwrap().payload, vec![1]);
        assert_eq!(socket.pull_decoded().unwrap().payload, vec![2]);
    }
}
