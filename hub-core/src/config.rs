// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Configuration (C14, §4.13, §6): the raw, externally-supplied values and the resolved,
//! boundary-clamped form the rest of the crate actually reads. Layering (defaults < TOML
//! file < env vars < CLI flags) is the binary's job (`hub::config`); this module only
//! owns the shape and the clamps, which apply identically regardless of where a value
//! came from.

use serde::{Deserialize, Serialize};

use crate::pool::adjust_message_pool_size;
use crate::socket::OUT_QUEUE_SIZE;

/// Raw configuration values as loaded from any layer. All fields have crate-level
/// defaults so a caller can deserialize a partial TOML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub uid: u64,
    pub listen: bool,
    pub connection_pool_size: usize,
    pub message_pool_size: usize,
    pub output_queue_limit: usize,
    pub max_new_connections: usize,
    pub reserved_messages: usize,
    pub message_ttl: u32,
    pub allow_packet_drop: bool,
    pub connection_timeout_secs: u64,
    pub alarm_interval_secs: u64,
    pub watch_path: String,
    /// Share of per-cycle publish capacity reserved for answer-class traffic (§4.9).
    pub answer_ratio: f64,
    /// Share of per-cycle publish capacity available to forward-class traffic (§4.9).
    pub forward_ratio: f64,
    /// Per-connection read cap with no memory pressure at all (§4.10).
    pub cycle_input_limit: usize,
    /// Master switch for per-connection throttling; `false` lets every connection read up
    /// to `cycle_input_limit` regardless of message-pool headroom.
    pub throttle: bool,
    /// Capacity of the `mio::Events` buffer a single `Reactor::poll` call can report.
    pub max_io_events: usize,
    /// Capacity of the temporary-connection ring — connections accepted but not yet
    /// promoted to a permanent slot (§4.7).
    pub backlog: usize,
    /// Free-text identity surfaced in logs and the `HubInfo` snapshot; has no effect on
    /// behavior.
    pub service_name: String,
    pub service_type: String,
    /// Optional path to a single-instance lock file; when set, `hub::main` refuses to
    /// start a second process pointed at the same path.
    pub semaphore: Option<String>,
    /// An additional signal number (beyond `SIGINT`/`SIGTERM`) to route through the
    /// interrupt notifier as a shutdown trigger.
    pub signal: Option<i32>,
    /// 0 = error only, 4 = trace.
    pub verbosity: u8,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            uid: 0,
            listen: true,
            connection_pool_size: 1024,
            message_pool_size: 4096,
            output_queue_limit: 64,
            max_new_connections: 16,
            reserved_messages: 256,
            message_ttl: 8,
            allow_packet_drop: true,
            connection_timeout_secs: 30,
            alarm_interval_secs: 1,
            watch_path: "/tmp".to_string(),
            answer_ratio: 0.5,
            forward_ratio: 0.5,
            cycle_input_limit: 64,
            throttle: true,
            max_io_events: 1024,
            backlog: 128,
            service_name: "hub".to_string(),
            service_type: "hub".to_string(),
            semaphore: None,
            signal: None,
            verbosity: 2,
        }
    }
}

/// Boundary-clamped configuration: every field here is safe to use directly, no further
/// validation needed downstream. Structural invariants (§4.1, §4.13) are applied here
/// exactly once, regardless of which layer a raw value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub uid: u64,
    pub listen: bool,
    pub connection_pool_size: usize,
    pub message_pool_size: usize,
    pub output_queue_limit: usize,
    pub max_new_connections: usize,
    pub reserved_messages: usize,
    pub message_ttl: u32,
    pub allow_packet_drop: bool,
    pub connection_timeout: std::time::Duration,
    pub alarm_interval: std::time::Duration,
    pub watch_path: std::path::PathBuf,
    pub answer_ratio: f64,
    pub forward_ratio: f64,
    pub cycle_input_limit: usize,
    pub throttle: bool,
    pub max_io_events: usize,
    pub backlog: usize,
    pub service_name: String,
    pub service_type: String,
    pub semaphore: Option<String>,
    pub signal: Option<i32>,
    pub verbosity: u8,
}

impl HubConfig {
    #[must_use]
    pub fn resolve(&self) -> ResolvedConfig {
        let message_pool_size = adjust_message_pool_size(self.message_pool_size);
        let output_queue_limit = self.output_queue_limit.min(OUT_QUEUE_SIZE - 1);
        let reserved_messages = self.reserved_messages.min(message_pool_size);
        // §6: a hub that isn't listening can never originate a fresh connection, so its
        // admission cap is pinned to zero regardless of what was configured.
        let max_new_connections = if self.listen { self.max_new_connections.min(self.connection_pool_size) } else { 0 };

        ResolvedConfig {
            uid: self.uid,
            listen: self.listen,
            connection_pool_size: self.connection_pool_size,
            message_pool_size,
            output_queue_limit,
            max_new_connections,
            reserved_messages,
            message_ttl: self.message_ttl,
            allow_packet_drop: self.allow_packet_drop,
            connection_timeout: std::time::Duration::from_secs(self.connection_timeout_secs),
            alarm_interval: std::time::Duration::from_secs(self.alarm_interval_secs.max(1)),
            watch_path: self.watch_path.clone().into(),
            answer_ratio: self.answer_ratio.clamp(0.0, 1.0),
            forward_ratio: self.forward_ratio.clamp(0.0, 1.0),
            cycle_input_limit: self.cycle_input_limit,
            throttle: self.throttle,
            max_io_events: self.max_io_events.max(1),
            backlog: self.backlog.max(1),
            service_name: self.service_name.clone(),
            service_type: self.service_type.clone(),
            semaphore: self.semaphore.clone(),
            signal: self.signal,
            verbosity: self.verbosity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_clamps_message_pool_size_to_the_boundary_rule() {
        let mut config = HubConfig { message_pool_size: 16, ..HubConfig::default() };
        assert_eq!(config.resolve().message_pool_size, 15);
        config.message_pool_size = 1;
        assert_eq!(config.resolve().message_pool_size, 3);
    }

    #[test]
    fn resolve_clamps_output_queue_limit_below_out_queue_size() {
        let config = HubConfig { output_queue_limit: 9999, ..HubConfig::default() };
        assert_eq!(config.resolve().output_queue_limit, OUT_QUEUE_SIZE - 1);
    }

    #[test]
    fn resolve_clamps_reserved_messages_to_pool_size() {
        let config = HubConfig { reserved_messages: 100_000, message_pool_size: 4096, ..HubConfig::default() };
        let resolved = config.resolve();
        assert_eq!(resolved.reserved_messages, resolved.message_pool_size);
    }

    #[test]
    fn resolve_clamps_max_new_connections_to_pool_size() {
        let config = HubConfig { max_new_connections: 100, connection_pool_size: 10, ..HubConfig::default() };
        assert_eq!(config.resolve().max_new_connections, 10);
    }

    #[test]
    fn resolve_pins_max_new_connections_to_zero_when_not_listening() {
        let config = HubConfig { listen: false, max_new_connections: 16, ..HubConfig::default() };
        assert_eq!(config.resolve().max_new_connections, 0);
    }

    #[test]
    fn resolve_clamps_ratios_into_the_unit_interval() {
        let config = HubConfig { answer_ratio: 1.5, forward_ratio: -0.2, ..HubConfig::default() };
        let resolved = config.resolve();
        assert_eq!(resolved.answer_ratio, 1.0);
        assert_eq!(resolved.forward_ratio, 0.0);
    }
}
