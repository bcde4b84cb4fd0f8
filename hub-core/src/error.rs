// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Error kinds surfaced by the reactor core.
//!
//! Per-watcher failures never propagate out of [`crate::reactor::Reactor::poll`] — they
//! are caught at the watcher boundary, logged, and turned into a [`disable`] of the
//! offending watcher. Only [`crate::hub::Hub::configure`] and the fatal-abort path in
//! [`crate::registry::WatcherRegistry::stop`] surface a [`HubError`] to the caller.
//!
//! [`disable`]: crate::reactor::Reactor::disable

use std::io;

pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HubError {
    /// A null watcher handle, a duplicate attach, or a double-start.
    #[error("invalid parameter: {0}")]
    #[diagnostic(code(hub::invalid_param))]
    InvalidParam(String),

    /// Attach of a UID that is already present in the registry.
    #[error("invalid operation: watcher {uid} is already attached")]
    #[diagnostic(code(hub::invalid_operation))]
    InvalidOperation { uid: u64 },

    /// A notifier singleton was required but is absent.
    #[error("required notifier singleton is not configured: {what}")]
    #[diagnostic(
        code(hub::resource),
        help("enable the singleton in HubContext before calling this operation")
    )]
    Resource { what: &'static str },

    /// The temporary-connection ring is full even after a sweep.
    #[error("temporary connection ring overflow")]
    #[diagnostic(code(hub::overflow))]
    Overflow,

    /// An allocation failed for a reason that does not fit another kind.
    #[error("allocation failed: {0}")]
    #[diagnostic(code(hub::alloc_failed))]
    AllocFailed(String),

    /// The underlying OS call failed; `code` is `errno` when available.
    #[error("system error: {source}")]
    #[diagnostic(code(hub::system))]
    System {
        #[source]
        source: io::Error,
    },
}

impl From<io::Error> for HubError {
    fn from(source: io::Error) -> Self { HubError::System { source } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_error_wraps_io_error() {
        let io_err = io::Error::from_raw_os_error(9);
        let err: HubError = io_err.into();
        assert!(matches!(err, HubError::System { .. }));
    }

    #[test]
    fn invalid_operation_carries_uid() {
        let err = HubError::InvalidOperation { uid: 42 };
        assert_eq!(err.to_string(), "invalid operation: watcher 42 is already attached");
    }
}
