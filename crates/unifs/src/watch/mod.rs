// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Change notification: events, watchers and background delivery.

mod aggregate;
mod dispatch;
mod event;
mod watcher;
mod wrap;

pub use aggregate::AggregateWatcher;
pub use dispatch::EventDispatcher;
pub use event::{ChangeEvent, ChangeKind, NotifyFilters, RenameEvent, WatchErrorEvent};
pub use watcher::{
    WatchSubscriber,
    Watcher,
    WatcherConfig,
    WatcherCore,
    DEFAULT_BUFFER_SIZE,
};
pub use wrap::{PathConverter, WrapWatcher};

pub(crate) use watcher::CoreWatcher;
