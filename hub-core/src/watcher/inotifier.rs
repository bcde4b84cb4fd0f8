// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! The filesystem-change notifier (C11, §4.6): watches a configured path (typically the
//! hub's own unix-socket directory) so the hub can react to files appearing or
//! disappearing out from under it without polling `stat` in a loop.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use crate::socket::IoReadiness;
use crate::types::Uid;
use crate::watcher::WatcherFlags;

/// A single filesystem change, trimmed to what [`crate::hooks::HubHooks::process_inotification`]
/// needs.
#[derive(Debug, Clone)]
pub struct InotifyEvent {
    pub path: PathBuf,
    pub kind: InotifyEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InotifyEventKind {
    Created,
    Removed,
    Modified,
    Other,
}

/// Source of filesystem-change events. Unlike the other notifiers this one does not
/// expose a raw fd: the `notify` crate's recommended watchers (`inotify` on Linux) run
/// their own background thread and deliver events over a channel, which the reactor
/// drains opportunistically rather than waiting on via `mio::Poll`.
pub trait InotifierSource: Send {
    fn try_recv(&mut self) -> Option<InotifyEvent>;
}

pub struct NotifyCrateSource {
    _watcher: notify::RecommendedWatcher,
    events: Receiver<InotifyEvent>,
}

impl std::fmt::Debug for NotifyCrateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyCrateSource").finish_non_exhaustive()
    }
}

impl NotifyCrateSource {
    pub fn new(path: &Path) -> io::Result<Self> {
        use notify::{EventKind, RecursiveMode, Watcher};
        let (tx, rx) = std::sync::mpsc::channel::<InotifyEvent>();
        let forward = move |res: notify::Result<notify::Event>| {
            let Ok(event) = res else { return };
            let kind = match event.kind {
                EventKind::Create(_) => InotifyEventKind::Created,
                EventKind::Remove(_) => InotifyEventKind::Removed,
                EventKind::Modify(_) => InotifyEventKind::Modified,
                _ => InotifyEventKind::Other,
            };
            for path in event.paths {
                let _ = tx.send(InotifyEvent { path, kind });
            }
        };
        let mut watcher = notify::recommended_watcher(forward)
            .map_err(|e| io::Error::other(e.to_string()))?;
        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| io::Error::other(e.to_string()))?;
        Ok(Self { _watcher: watcher, events: rx })
    }
}

impl InotifierSource for NotifyCrateSource {
    fn try_recv(&mut self) -> Option<InotifyEvent> { self.events.try_recv().ok() }
}

#[derive(Debug)]
pub struct InotifierWatcher {
    pub uid: Uid,
    pub flags: WatcherFlags,
    pub readiness: IoReadiness,
}

impl InotifierWatcher {
    #[must_use]
    pub fn new(uid: Uid) -> Self {
        Self { uid, flags: WatcherFlags::empty(), readiness: IoReadiness::empty() }
    }
}

#[derive(Debug, Default)]
pub struct MockInotifierSource {
    pub queued: std::collections::VecDeque<InotifyEvent>,
}

impl InotifierSource for MockInotifierSource {
    fn try_recv(&mut self) -> Option<InotifyEvent> { self.queued.pop_front() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_source_drains_in_order() {
        let mut source = MockInotifierSource::default();
        source.queued.push_back(InotifyEvent { path: PathBuf::from("/tmp/a"), kind: InotifyEventKind::Created });
        source.queued.push_back(InotifyEvent { path: PathBuf::from("/tmp/b"), kind: InotifyEventKind::Removed });
        assert_eq!(source.try_recv().unwrap().path, PathBuf::from("/tmp/a"));
        assert_eq!(source.try_recv().unwrap().kind, InotifyEventKind::Removed);
        assert!(source.try_recv().is_none());
    }
}

