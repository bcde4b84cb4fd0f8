// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Small typed wrappers used throughout the core instead of bare `u64`/`u32`.

use std::fmt;

/// Identifies a watcher (and, for sockets, the connection it backs) within a single hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Uid(pub u64);

impl Uid {
    pub const fn new(value: u64) -> Self { Self(value) }

    #[must_use]
    pub const fn get(self) -> u64 { self.0 }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<u64> for Uid {
    fn from(value: u64) -> Self { Self(value) }
}

/// A coarse partition tag used to keep unrelated traffic classes from crossing over at
/// the publish boundary (see [`crate::publish::publish`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Group(pub u32);

impl Group {
    /// The default group: never conflicts with another default-group watcher.
    pub const NONE: Group = Group(0);

    #[must_use]
    pub const fn conflicts_with(self, other: Group) -> bool {
        self.0 != 0 && other.0 != 0 && self.0 != other.0
    }
}
