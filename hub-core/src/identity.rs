// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Identity resolution (§4.9): turning a message's `destination` field into something
//! the routing table can act on. Out of scope for the core itself — a production hub
//! plugs in whatever naming scheme its deployment uses (DNS-like hierarchy, a
//! flat overlay namespace, etc).

use crate::types::Uid;

pub trait IdentityProvider: Send {
    /// Resolves a logical destination to the UID of the socket currently responsible for
    /// it, or `None` if nothing claims that destination (the message is then dropped per
    /// §4.9's unreachable-destination case).
    fn resolve(&self, destination: Uid) -> Option<Uid>;
}

/// The identity scheme used by the bundled loopback setup: every destination maps to
/// itself. Sufficient for the end-to-end scenarios in `tests/`, useless for anything
/// with actual routing.
#[derive(Debug, Default)]
pub struct IdentityMapping;

impl IdentityProvider for IdentityMapping {
    fn resolve(&self, destination: Uid) -> Option<Uid> { Some(destination) }
}
