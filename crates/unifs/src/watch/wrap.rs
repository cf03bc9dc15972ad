// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;

use super::dispatch::EventDispatcher;
use super::event::{ChangeEvent, NotifyFilters, RenameEvent, WatchErrorEvent};
use super::watcher::{WatchSubscriber, Watcher, WatcherConfig, WatcherCore};
use crate::fs::SharedFileSystem;
use crate::path::VfsPath;
use crate::Result;

/// Translates event paths from a delegate watcher's namespace.
///
/// Returning None drops the event.
pub type PathConverter = Arc<dyn Fn(&VfsPath) -> Option<VfsPath> + Send + Sync>;

/// Forwards another watcher's events under translated paths.
///
/// Configuration reads and writes pass through to the wrapped watcher.
/// Each incoming event has its paths converted; events the converter
/// rejects are dropped silently, and the rest are re-raised through
/// this watcher's own delivery policy so the name filter and
/// containment checks apply against the translated path.
pub struct WrapWatcher {
    inner: Box<dyn Watcher>,
    core: Arc<WatcherCore>,
}

impl WrapWatcher {
    pub fn new(
        fs: SharedFileSystem,
        path: VfsPath,
        inner: Box<dyn Watcher>,
        convert: PathConverter,
    ) -> Self {
        let core = WatcherCore::new(fs, path, Arc::new(EventDispatcher::new()));
        inner.subscribe(Arc::new(Forwarder {
            core: Arc::clone(&core),
            convert,
        }));
        Self { inner, core }
    }
}

struct Forwarder {
    core: Arc<WatcherCore>,
    convert: PathConverter,
}

impl WatchSubscriber for Forwarder {
    fn created(&self, event: &ChangeEvent) {
        if let Some(path) = (self.convert)(&event.path) {
            self.core.raise_created(path);
        }
    }

    fn deleted(&self, event: &ChangeEvent) {
        if let Some(path) = (self.convert)(&event.path) {
            self.core.raise_deleted(path);
        }
    }

    fn changed(&self, event: &ChangeEvent) {
        if let Some(path) = (self.convert)(&event.path) {
            self.core.raise_changed(path);
        }
    }

    fn renamed(&self, event: &RenameEvent) {
        // a rename needs both endpoints inside the translated namespace
        match (
            (self.convert)(&event.path),
            (self.convert)(&event.old_path),
        ) {
            (Some(path), Some(old_path)) => self.core.raise_renamed(path, old_path),
            _ => (),
        }
    }

    fn error(&self, event: &WatchErrorEvent) {
        let path = event.path.as_ref().and_then(|p| (self.convert)(p));
        self.core.raise_error(Arc::clone(&event.error), path);
    }
}

impl Watcher for WrapWatcher {
    fn filesystem(&self) -> SharedFileSystem {
        self.core.filesystem()
    }

    fn path(&self) -> VfsPath {
        self.core.path()
    }

    fn config(&self) -> WatcherConfig {
        self.inner.config()
    }

    fn set_filter(&self, filter: &str) -> Result<()> {
        self.inner.set_filter(filter)?;
        self.core.set_filter(filter)
    }

    fn set_notify_filters(&self, notify_filters: NotifyFilters) {
        self.inner.set_notify_filters(notify_filters);
        self.core.set_notify_filters(notify_filters);
    }

    fn set_enabled(&self, enabled: bool) {
        self.inner.set_enabled(enabled);
        self.core.set_enabled(enabled);
    }

    fn set_include_subdirectories(&self, include_subdirectories: bool) {
        self.inner.set_include_subdirectories(include_subdirectories);
        self.core.set_include_subdirectories(include_subdirectories);
    }

    fn set_buffer_size(&self, buffer_size: usize) {
        self.inner.set_buffer_size(buffer_size);
        self.core.set_buffer_size(buffer_size);
    }

    fn subscribe(&self, subscriber: Arc<dyn WatchSubscriber>) {
        self.core.subscribe(subscriber)
    }
}
