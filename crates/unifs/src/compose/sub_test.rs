// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;
use std::time::Duration;

use rstest::rstest;

use super::{SubFileSystem, SubRoot};
use crate::backend::MemoryFileSystem;
use crate::compose::PathMapper;
use crate::watch::{ChangeKind, Watcher};
use crate::{
    Error,
    FileSystem,
    ReadFileSystem,
    SearchTarget,
    VfsPath,
};

fixtures!();

const WAIT: Duration = Duration::from_secs(2);
const SETTLE: Duration = Duration::from_millis(200);

#[rstest]
fn test_read_through_a_sub_view(memfs: MemoryFileSystem) {
    ensure(&memfs, "/a/b/c.txt", &[0x01, 0x02]);

    let sub = SubFileSystem::new(shared(&memfs), "/a").unwrap();
    assert_eq!(sub.read_to_vec(&VfsPath::new("/b/c.txt")).unwrap(), [0x01, 0x02]);
    assert!(sub.file_exists(&VfsPath::new("/b/c.txt")).unwrap());
    assert!(!sub.file_exists(&VfsPath::new("/a/b/c.txt")).unwrap());
}

#[rstest]
fn test_requires_an_existing_directory(memfs: MemoryFileSystem) {
    assert!(matches!(
        SubFileSystem::new(shared(&memfs), "/missing"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        SubFileSystem::new(shared(&memfs), "relative"),
        Err(Error::InvalidPath { .. })
    ));
}

#[rstest]
fn test_writes_land_under_the_sub_root(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/mnt")).unwrap();
    let sub = SubFileSystem::new(shared(&memfs), "/mnt").unwrap();

    sub.create_directory(&VfsPath::new("/data")).unwrap();
    sub.write_all(&VfsPath::new("/data/file.bin"), b"payload").unwrap();

    assert!(memfs
        .directory_exists(&VfsPath::new("/mnt/data"))
        .unwrap());
    assert_eq!(
        memfs.read_to_vec(&VfsPath::new("/mnt/data/file.bin")).unwrap(),
        b"payload"
    );
}

#[rstest]
fn test_enumeration_translates_paths(memfs: MemoryFileSystem) {
    ensure(&memfs, "/a/x.txt", b"1");
    ensure(&memfs, "/a/sub/y.txt", b"2");
    ensure(&memfs, "/other.txt", b"3");

    let sub = SubFileSystem::new(shared(&memfs), "/a").unwrap();
    let mut paths: Vec<_> = sub
        .enumerate(&VfsPath::root(), "*.txt", true, SearchTarget::File)
        .unwrap()
        .collect::<crate::Result<_>>()
        .unwrap();
    paths.sort();
    assert_eq!(
        paths,
        vec![VfsPath::new("/sub/y.txt"), VfsPath::new("/x.txt")]
    );
}

#[rstest]
fn test_mapper_round_trip() {
    let mapper = SubRoot::new(VfsPath::new("/a"));
    assert_eq!(mapper.to_delegate(&VfsPath::new("/b/c")).as_str(), "/a/b/c");
    assert_eq!(mapper.to_delegate(&VfsPath::root()).as_str(), "/a");
    assert_eq!(
        mapper.from_delegate(&VfsPath::new("/a/b/c")).unwrap().as_str(),
        "/b/c"
    );
    assert_eq!(mapper.from_delegate(&VfsPath::new("/a")).unwrap().as_str(), "/");
    assert!(matches!(
        mapper.from_delegate(&VfsPath::new("/elsewhere")),
        Err(Error::InvariantViolation { .. })
    ));
    assert!(matches!(
        mapper.from_delegate(&VfsPath::new("/ab")),
        Err(Error::InvariantViolation { .. })
    ));
}

#[rstest]
fn test_watcher_translates_event_paths(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/a")).unwrap();
    let sub = SubFileSystem::new(shared(&memfs), "/a").unwrap();

    let watcher = sub.watch(&VfsPath::root()).unwrap();
    watcher.set_filter("*.txt").unwrap();
    watcher.set_enabled(true);
    let events = Arc::new(CollectingSubscriber::default());
    watcher.subscribe(events.clone());

    memfs.write_all(&VfsPath::new("/a/b.txt"), b"inside").unwrap();

    assert!(events.wait_for_changes(1, WAIT));
    let changes = events.changes();
    assert_eq!(changes[0].0, ChangeKind::Created);
    assert_eq!(changes[0].1, VfsPath::new("/b.txt"));
}

#[rstest]
fn test_events_outside_the_sub_root_are_dropped(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/a")).unwrap();
    let sub = SubFileSystem::new(shared(&memfs), "/a").unwrap();

    let watcher = sub.watch(&VfsPath::root()).unwrap();
    watcher.set_filter("*").unwrap();
    watcher.set_enabled(true);
    let events = Arc::new(CollectingSubscriber::default());
    watcher.subscribe(events.clone());

    memfs.write_all(&VfsPath::new("/outside.txt"), b"outside").unwrap();
    assert!(!events.wait_for_changes(1, SETTLE));
}
