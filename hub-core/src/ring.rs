// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Bounded single-producer/single-consumer queues used for the inbound and outbound
//! message streams (see [`crate::hub::Hub`]).
//!
//! This is a plain circular buffer over a fixed-size `Vec<Option<T>>` rather than an
//! indexed deque — the hub only ever needs FIFO `put`/`get` plus a read-space count,
//! never indexed access or truncation.

/// A fixed-capacity FIFO queue. `put` fails (returns `false`, item is returned to the
/// caller) once [`BoundedRing::has_space`] is `false`; `get` returns `None` once
/// [`BoundedRing::is_empty`] is `true`.
#[derive(Debug)]
pub struct BoundedRing<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> BoundedRing<T> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, head: 0, len: 0 }
    }

    #[must_use]
    pub fn capacity(&self) -> usize { self.slots.len() }

    #[must_use]
    pub fn has_space(&self) -> bool { self.len < self.capacity() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Number of items currently queued — the "read space" available to a consumer.
    #[must_use]
    pub fn read_space(&self) -> usize { self.len }

    /// Appends `value` at the tail. Returns `Err(value)` if the ring is full.
    pub fn put(&mut self, value: T) -> Result<(), T> {
        if !self.has_space() {
            return Err(value);
        }
        let tail = (self.head + self.len) % self.capacity().max(1);
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the head item, if any.
    pub fn get(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity().max(1);
        self.len -= 1;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let mut ring = BoundedRing::new(3);
        ring.put(1).unwrap();
        ring.put(2).unwrap();
        ring.put(3).unwrap();
        assert!(ring.put(4).is_err());
        assert_eq!(ring.get(), Some(1));
        assert_eq!(ring.get(), Some(2));
        ring.put(4).unwrap();
        assert_eq!(ring.get(), Some(3));
        assert_eq!(ring.get(), Some(4));
        assert_eq!(ring.get(), None);
    }

    #[test]
    fn read_space_tracks_queued_count() {
        let mut ring: BoundedRing<u8> = BoundedRing::new(4);
        assert_eq!(ring.read_space(), 0);
        ring.put(1).unwrap();
        ring.put(2).unwrap();
        assert_eq!(ring.read_space(), 2);
        ring.get();
        assert_eq!(ring.read_space(), 1);
    }

    #[test]
    fn wraps_around_the_backing_storage() {
        let mut ring = BoundedRing::new(2);
        ring.put(1).unwrap();
        ring.get();
        ring.put(2).unwrap();
        ring.put(3).unwrap();
        assert_eq!(ring.get(), Some(2));
        assert_eq!(ring.get(), Some(3));
    }
}
