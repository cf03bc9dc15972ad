// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::dispatch::EventDispatcher;
use super::event::{ChangeEvent, ChangeKind, NotifyFilters, RenameEvent, WatchErrorEvent};
use crate::filter::SearchPattern;
use crate::fs::SharedFileSystem;
use crate::path::VfsPath;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./watcher_test.rs"]
mod watcher_test;

/// Default size hint for a watcher's internal event buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Receives change notifications from a watcher.
///
/// Methods run on the producing backend's dispatcher thread and default
/// to doing nothing, so implementations override only the streams they
/// care about.
pub trait WatchSubscriber: Send + Sync {
    fn created(&self, _event: &ChangeEvent) {}

    fn deleted(&self, _event: &ChangeEvent) {}

    fn changed(&self, _event: &ChangeEvent) {}

    fn renamed(&self, _event: &RenameEvent) {}

    fn error(&self, _event: &WatchErrorEvent) {}
}

/// The mutable configuration shared by every watcher kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Name filter applied to the final segment of event paths
    pub filter: String,
    pub notify_filters: NotifyFilters,
    /// Whether events are delivered at all
    pub enabled: bool,
    /// Whether events below direct children of the watched path qualify
    pub include_subdirectories: bool,
    pub buffer_size: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            filter: "*.*".to_string(),
            notify_filters: NotifyFilters::default(),
            enabled: false,
            include_subdirectories: false,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// An event source attached to a backend and a path.
///
/// Watchers deliver change notifications for entries under their path,
/// subject to their configuration. Dropping a watcher detaches it from
/// its backend and stops delivery.
pub trait Watcher: Send + Sync {
    /// The filesystem whose changes this watcher reports.
    fn filesystem(&self) -> SharedFileSystem;

    /// The watched directory.
    fn path(&self) -> VfsPath;

    /// A snapshot of the current configuration.
    fn config(&self) -> WatcherConfig;

    /// Set the name filter, failing if it does not compile.
    fn set_filter(&self, filter: &str) -> Result<()>;

    fn set_notify_filters(&self, notify_filters: NotifyFilters);

    fn set_enabled(&self, enabled: bool);

    fn set_include_subdirectories(&self, include_subdirectories: bool);

    fn set_buffer_size(&self, buffer_size: usize);

    /// Register a subscriber for this watcher's event streams.
    fn subscribe(&self, subscriber: Arc<dyn WatchSubscriber>);
}

/// State and delivery policy shared by every watcher implementation.
///
/// `raise_*` methods are the only entry points for emitting events. A
/// change event is delivered iff the watcher is enabled, the compiled
/// filter matches the path's final name and the path lies within the
/// watched directory (recursively when configured). The error stream
/// skips the name and containment checks. Delivery itself happens on
/// the dispatcher thread: each raise snapshots the subscriber list
/// under its lock, releases the lock, and queues a closure over the
/// snapshot so no lock is ever held while subscriber code runs.
pub struct WatcherCore {
    fs: SharedFileSystem,
    path: VfsPath,
    config: Mutex<WatcherConfig>,
    pattern: Mutex<CompiledFilter>,
    subscribers: Mutex<Vec<Arc<dyn WatchSubscriber>>>,
    dispatcher: Arc<EventDispatcher>,
    // handed to delivery jobs so a captured failure can be routed back
    // through this same core without keeping it alive
    weak_self: Weak<WatcherCore>,
}

struct CompiledFilter {
    filter: String,
    pattern: SearchPattern,
}

impl WatcherCore {
    pub fn new(fs: SharedFileSystem, path: VfsPath, dispatcher: Arc<EventDispatcher>) -> Arc<Self> {
        let config = WatcherConfig::default();
        let pattern = CompiledFilter {
            filter: config.filter.clone(),
            pattern: SearchPattern::parse(&config.filter)
                .expect("the default filter always compiles"),
        };
        Arc::new_cyclic(|weak_self| Self {
            fs,
            path,
            config: Mutex::new(config),
            pattern: Mutex::new(pattern),
            subscribers: Mutex::new(Vec::new()),
            dispatcher,
            weak_self: weak_self.clone(),
        })
    }

    pub fn filesystem(&self) -> SharedFileSystem {
        Arc::clone(&self.fs)
    }

    pub fn path(&self) -> VfsPath {
        self.path.clone()
    }

    pub fn config(&self) -> WatcherConfig {
        self.config.lock().clone()
    }

    pub fn set_filter(&self, filter: &str) -> Result<()> {
        let pattern = SearchPattern::parse(filter)?;
        self.config.lock().filter = filter.to_string();
        *self.pattern.lock() = CompiledFilter {
            filter: filter.to_string(),
            pattern,
        };
        Ok(())
    }

    pub fn set_notify_filters(&self, notify_filters: NotifyFilters) {
        self.config.lock().notify_filters = notify_filters;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.config.lock().enabled = enabled;
    }

    pub fn set_include_subdirectories(&self, include_subdirectories: bool) {
        self.config.lock().include_subdirectories = include_subdirectories;
    }

    pub fn set_buffer_size(&self, buffer_size: usize) {
        self.config.lock().buffer_size = buffer_size;
    }

    pub fn subscribe(&self, subscriber: Arc<dyn WatchSubscriber>) {
        self.subscribers.lock().push(subscriber);
    }

    pub fn raise_created(&self, path: VfsPath) {
        self.raise_change(ChangeKind::Created, path);
    }

    pub fn raise_deleted(&self, path: VfsPath) {
        self.raise_change(ChangeKind::Deleted, path);
    }

    pub fn raise_changed(&self, path: VfsPath) {
        self.raise_change(ChangeKind::Changed, path);
    }

    fn raise_change(&self, kind: ChangeKind, path: VfsPath) {
        if !self.should_raise(&path) {
            return;
        }
        let event = ChangeEvent {
            fs: Arc::clone(&self.fs),
            kind,
            path,
        };
        let snapshot = self.subscribers.lock().clone();
        let weak = self.weak_self.clone();
        self.enqueue(Box::new(move || {
            for subscriber in &snapshot {
                let delivery = catch_unwind(AssertUnwindSafe(|| match kind {
                    ChangeKind::Created => subscriber.created(&event),
                    ChangeKind::Deleted => subscriber.deleted(&event),
                    ChangeKind::Changed => subscriber.changed(&event),
                    ChangeKind::Renamed => (),
                }));
                if let Err(payload) = delivery {
                    if let Some(core) = weak.upgrade() {
                        core.raise_error_from_worker(panic_error(payload), Some(event.path.clone()));
                    }
                }
            }
        }));
    }

    pub fn raise_renamed(&self, path: VfsPath, old_path: VfsPath) {
        if !self.should_raise(&path) {
            return;
        }
        let event = RenameEvent {
            fs: Arc::clone(&self.fs),
            path,
            old_path,
        };
        let snapshot = self.subscribers.lock().clone();
        let weak = self.weak_self.clone();
        self.enqueue(Box::new(move || {
            for subscriber in &snapshot {
                let delivery = catch_unwind(AssertUnwindSafe(|| subscriber.renamed(&event)));
                if let Err(payload) = delivery {
                    if let Some(core) = weak.upgrade() {
                        core.raise_error_from_worker(panic_error(payload), Some(event.path.clone()));
                    }
                }
            }
        }));
    }

    /// Publish onto the error stream.
    ///
    /// Gated only by the enabled flag; the name filter and containment
    /// checks do not apply.
    pub fn raise_error(&self, error: Arc<Error>, path: Option<VfsPath>) {
        if !self.config.lock().enabled {
            return;
        }
        let snapshot = self.subscribers.lock().clone();
        self.enqueue(Box::new(error_job(snapshot, error, path)));
    }

    /// Error publication from the dispatcher thread itself.
    ///
    /// Must not block on the queue it is draining, and a failing error
    /// subscriber is only logged rather than re-captured.
    fn raise_error_from_worker(&self, error: Arc<Error>, path: Option<VfsPath>) {
        if !self.config.lock().enabled {
            return;
        }
        let snapshot = self.subscribers.lock().clone();
        if let Err(err) = self
            .dispatcher
            .try_dispatch(Box::new(error_job(snapshot, error, path)))
        {
            tracing::debug!(?err, "dropping error event");
        }
    }

    fn enqueue(&self, job: super::dispatch::Job) {
        if let Err(err) = self.dispatcher.dispatch(job) {
            tracing::debug!(?err, "dropping event, dispatcher is closed");
        }
    }

    fn should_raise(&self, path: &VfsPath) -> bool {
        let (enabled, include_subdirectories, filter) = {
            let config = self.config.lock();
            (
                config.enabled,
                config.include_subdirectories,
                config.filter.clone(),
            )
        };
        if !enabled {
            return false;
        }
        if !self.pattern_for(&filter).matches(path.file_name()) {
            return false;
        }
        path.is_in_directory(&self.path, include_subdirectories)
    }

    /// The compiled form of the given filter, recompiling only when the
    /// string has changed since the last raise.
    fn pattern_for(&self, filter: &str) -> SearchPattern {
        let mut compiled = self.pattern.lock();
        if compiled.filter != filter {
            match SearchPattern::parse(filter) {
                Ok(pattern) => {
                    *compiled = CompiledFilter {
                        filter: filter.to_string(),
                        pattern,
                    };
                }
                Err(err) => {
                    tracing::warn!(?err, filter, "ignoring uncompilable watch filter");
                }
            }
        }
        compiled.pattern.clone()
    }
}

fn error_job(
    snapshot: Vec<Arc<dyn WatchSubscriber>>,
    error: Arc<Error>,
    path: Option<VfsPath>,
) -> impl FnOnce() + Send + 'static {
    move || {
        let event = WatchErrorEvent { error, path };
        for subscriber in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| subscriber.error(&event))).is_err() {
                tracing::warn!("watch error subscriber panicked");
            }
        }
    }
}

fn panic_error(payload: Box<dyn std::any::Any + Send>) -> Arc<Error> {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "subscriber panicked".to_string()
    };
    Arc::new(Error::String(format!("watch subscriber failed: {message}")))
}

impl std::fmt::Debug for WatcherCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherCore")
            .field("path", &self.path)
            .field("config", &*self.config.lock())
            .finish()
    }
}

/// A watcher backed directly by a [`WatcherCore`], used by leaf
/// backends that raise their own events.
pub(crate) struct CoreWatcher {
    pub(crate) core: Arc<WatcherCore>,
}

impl Watcher for CoreWatcher {
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
        self.core.set_filter(filter)
    }

    fn set_notify_filters(&self, notify_filters: NotifyFilters) {
        self.core.set_notify_filters(notify_filters)
    }

    fn set_enabled(&self, enabled: bool) {
        self.core.set_enabled(enabled)
    }

    fn set_include_subdirectories(&self, include_subdirectories: bool) {
        self.core.set_include_subdirectories(include_subdirectories)
    }

    fn set_buffer_size(&self, buffer_size: usize) {
        self.core.set_buffer_size(buffer_size)
    }

    fn subscribe(&self, subscriber: Arc<dyn WatchSubscriber>) {
        self.core.subscribe(subscriber)
    }
}
