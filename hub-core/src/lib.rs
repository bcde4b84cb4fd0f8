// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Core of a messaging hub: a single-threaded reactor that multiplexes listener and data
//! sockets alongside a handful of OS-level notifiers (alarm, event, filesystem, signal),
//! pools messages and connections out of fixed-capacity slabs, and runs an
//! Answer-First-Priority admission pipeline between them.
//!
//! The crate is organized as framework (this library) plus policy (the collaborator
//! traits in [`identity`], [`transport`], [`codec`], and [`hooks`]) that a binary
//! supplies. See the `hub` crate for the reference wiring.

pub mod admission;
pub mod codec;
pub mod config;
pub mod error;
pub mod hooks;
pub mod hub;
pub mod identity;
pub mod ingress;
pub mod message;
pub mod metrics;
pub mod notifiers;
pub mod pool;
pub mod publish;
pub mod reactor;
pub mod registry;
pub mod ring;
pub mod socket;
pub mod temp_ring;
pub mod throttle;
pub mod transport;
pub mod types;
pub mod watcher;

pub use error::{HubError, HubResult};
pub use hub::{Hub, HubCollaborators, LifecycleState};
