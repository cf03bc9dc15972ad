// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::AggregateWatcher;
use crate::backend::MemoryFileSystem;
use crate::watch::{ChangeKind, Watcher};
use crate::{FileSystem, VfsPath};

fixtures!();

const WAIT: Duration = Duration::from_secs(2);

#[rstest]
fn test_fan_in_from_two_backends() {
    let a = MemoryFileSystem::new();
    let b = MemoryFileSystem::new();
    let aggregate = AggregateWatcher::new(shared(&a), VfsPath::root());
    aggregate.add(a.watch(&VfsPath::root()).unwrap());
    aggregate.add(b.watch(&VfsPath::root()).unwrap());
    aggregate.set_filter("*").unwrap();
    aggregate.set_enabled(true);

    let events = Arc::new(CollectingSubscriber::default());
    aggregate.subscribe(events.clone());

    a.write_all(&VfsPath::new("/x"), b"in a").unwrap();
    b.write_all(&VfsPath::new("/y"), b"in b").unwrap();

    // one create per backend; cross-backend order is unspecified
    assert!(events.wait_for_changes(2, WAIT));
    let mut created: Vec<_> = events
        .changes()
        .into_iter()
        .filter(|(kind, _, _)| *kind == ChangeKind::Created)
        .map(|(_, path, _)| path)
        .collect();
    created.sort();
    assert_eq!(created, vec![VfsPath::new("/x"), VfsPath::new("/y")]);
}

#[rstest]
fn test_configuration_propagates_to_children() {
    let a = MemoryFileSystem::new();
    let b = MemoryFileSystem::new();
    let aggregate = AggregateWatcher::new(shared(&a), VfsPath::root());
    aggregate.add(a.watch(&VfsPath::root()).unwrap());
    aggregate.set_filter("*.log").unwrap();
    aggregate.set_enabled(true);
    aggregate.set_include_subdirectories(true);

    // a late child is brought in line with the cached configuration
    let late = b.watch(&VfsPath::root()).unwrap();
    aggregate.add(late);

    let events = Arc::new(CollectingSubscriber::default());
    aggregate.subscribe(events.clone());

    ensure(&b, "/sub/a.log", b"log");
    assert!(events.wait_for_changes(1, WAIT));
    assert!(events
        .changes()
        .iter()
        .any(|(_, path, _)| path == &VfsPath::new("/sub/a.log")));
}

#[rstest]
fn test_remove_by_backend_detaches_children() {
    let a = MemoryFileSystem::new();
    let b = MemoryFileSystem::new();
    let shared_a = shared(&a);
    let shared_b = shared(&b);
    let aggregate = AggregateWatcher::new(Arc::clone(&shared_a), VfsPath::root());
    aggregate.add(shared_a.watch(&VfsPath::root()).unwrap());
    aggregate.add(shared_b.watch(&VfsPath::root()).unwrap());
    aggregate.set_filter("*").unwrap();
    aggregate.set_enabled(true);
    assert_eq!(aggregate.len(), 2);

    let events = Arc::new(CollectingSubscriber::default());
    aggregate.subscribe(events.clone());

    aggregate.remove(&shared_b);
    assert_eq!(aggregate.len(), 1);

    b.write_all(&VfsPath::new("/ignored"), b"x").unwrap();
    a.write_all(&VfsPath::new("/seen"), b"x").unwrap();

    assert!(events.wait_for_changes(1, WAIT));
    std::thread::sleep(Duration::from_millis(200));
    assert!(events
        .changes()
        .iter()
        .all(|(_, path, _)| path.is_in_directory(&VfsPath::root(), true)
            && path != &VfsPath::new("/ignored")));
}

#[rstest]
fn test_remove_all_keeps_the_exception() {
    let a = MemoryFileSystem::new();
    let b = MemoryFileSystem::new();
    let shared_a = shared(&a);
    let shared_b = shared(&b);
    let aggregate = AggregateWatcher::new(Arc::clone(&shared_a), VfsPath::root());
    aggregate.add(shared_a.watch(&VfsPath::root()).unwrap());
    aggregate.add(shared_b.watch(&VfsPath::root()).unwrap());

    aggregate.remove_all(Some(&shared_b));
    assert_eq!(aggregate.len(), 1);

    aggregate.remove_all(None);
    assert!(aggregate.is_empty());
}

#[rstest]
fn test_setting_an_unchanged_value_is_a_noop() {
    let a = MemoryFileSystem::new();
    let aggregate = AggregateWatcher::new(shared(&a), VfsPath::root());
    aggregate.set_enabled(false);
    aggregate.set_filter("*.*").unwrap();
    assert_eq!(aggregate.config().filter, "*.*");
    assert!(!aggregate.config().enabled);
}
