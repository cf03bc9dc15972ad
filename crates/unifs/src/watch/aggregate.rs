// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;

use parking_lot::Mutex;

use super::dispatch::EventDispatcher;
use super::event::{ChangeEvent, NotifyFilters, RenameEvent, WatchErrorEvent};
use super::watcher::{WatchSubscriber, Watcher, WatcherConfig, WatcherCore};
use crate::fs::{ReadFileSystem, SharedFileSystem};
use crate::path::VfsPath;
use crate::Result;

#[cfg(test)]
#[path = "./aggregate_test.rs"]
mod aggregate_test;

/// Fans the events of any number of child watchers into one stream.
///
/// Children are typically watchers over different backends observing
/// the same logical path. Adding a child applies the aggregate's
/// current configuration to it; setting any configuration field
/// propagates the new value to every child before updating the cached
/// local copy. The child list is guarded by a mutex held for all
/// mutations and propagations. Removed children are dropped, which
/// detaches them from their backends.
pub struct AggregateWatcher {
    core: Arc<WatcherCore>,
    children: Mutex<Vec<Box<dyn Watcher>>>,
}

impl AggregateWatcher {
    pub fn new(fs: SharedFileSystem, path: VfsPath) -> Self {
        Self {
            core: WatcherCore::new(fs, path, Arc::new(EventDispatcher::new())),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Attach a child watcher, bringing it in line with the aggregate's
    /// configuration and forwarding its events.
    pub fn add(&self, child: Box<dyn Watcher>) {
        let mut children = self.children.lock();
        let config = self.core.config();
        if let Err(err) = child.set_filter(&config.filter) {
            // the cached filter was validated when it was set
            tracing::warn!(?err, "child watcher rejected the aggregate filter");
        }
        child.set_notify_filters(config.notify_filters);
        child.set_include_subdirectories(config.include_subdirectories);
        child.set_buffer_size(config.buffer_size);
        child.set_enabled(config.enabled);
        child.subscribe(Arc::new(Forwarder {
            core: Arc::clone(&self.core),
        }));
        children.push(child);
    }

    /// Detach every child observing the given backend.
    pub fn remove(&self, fs: &SharedFileSystem) {
        let mut children = self.children.lock();
        children.retain(|child| child.filesystem().identity() != fs.identity());
    }

    /// Detach all children, optionally keeping those observing one
    /// backend.
    pub fn remove_all(&self, except: Option<&SharedFileSystem>) {
        let mut children = self.children.lock();
        match except {
            None => children.clear(),
            Some(fs) => {
                children.retain(|child| child.filesystem().identity() == fs.identity());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }
}

struct Forwarder {
    core: Arc<WatcherCore>,
}

impl WatchSubscriber for Forwarder {
    fn created(&self, event: &ChangeEvent) {
        self.core.raise_created(event.path.clone());
    }

    fn deleted(&self, event: &ChangeEvent) {
        self.core.raise_deleted(event.path.clone());
    }

    fn changed(&self, event: &ChangeEvent) {
        self.core.raise_changed(event.path.clone());
    }

    fn renamed(&self, event: &RenameEvent) {
        self.core
            .raise_renamed(event.path.clone(), event.old_path.clone());
    }

    fn error(&self, event: &WatchErrorEvent) {
        self.core
            .raise_error(Arc::clone(&event.error), event.path.clone());
    }
}

impl Watcher for AggregateWatcher {
    fn filesystem(&self) -> SharedFileSystem {
        self.core.filesystem()
    }

    fn path(&self) -> VfsPath {
        self.core.path()
    }

    fn config(&self) -> WatcherConfig {
        self.core.config()
    }

    fn set_filter(&self, filter: &str) -> Result<()> {
        let children = self.children.lock();
        if self.core.config().filter == filter {
            return Ok(());
        }
        // validate once before touching any child
        crate::filter::SearchPattern::parse(filter)?;
        for child in children.iter() {
            child.set_filter(filter)?;
        }
        self.core.set_filter(filter)
    }

    fn set_notify_filters(&self, notify_filters: NotifyFilters) {
        let children = self.children.lock();
        if self.core.config().notify_filters == notify_filters {
            return;
        }
        for child in children.iter() {
            child.set_notify_filters(notify_filters);
        }
        self.core.set_notify_filters(notify_filters);
    }

    fn set_enabled(&self, enabled: bool) {
        let children = self.children.lock();
        if self.core.config().enabled == enabled {
            return;
        }
        for child in children.iter() {
            child.set_enabled(enabled);
        }
        self.core.set_enabled(enabled);
    }

    fn set_include_subdirectories(&self, include_subdirectories: bool) {
        let children = self.children.lock();
        if self.core.config().include_subdirectories == include_subdirectories {
            return;
        }
        for child in children.iter() {
            child.set_include_subdirectories(include_subdirectories);
        }
        self.core.set_include_subdirectories(include_subdirectories);
    }

    fn set_buffer_size(&self, buffer_size: usize) {
        let children = self.children.lock();
        if self.core.config().buffer_size == buffer_size {
            return;
        }
        for child in children.iter() {
            child.set_buffer_size(buffer_size);
        }
        self.core.set_buffer_size(buffer_size);
    }

    fn subscribe(&self, subscriber: Arc<dyn WatchSubscriber>) {
        self.core.subscribe(subscriber)
    }
}

impl std::fmt::Debug for AggregateWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateWatcher")
            .field("path", &self.core.path())
            .field("children", &self.children.lock().len())
            .finish()
    }
}
