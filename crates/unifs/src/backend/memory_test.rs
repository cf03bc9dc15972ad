// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::io::{Read, Seek, SeekFrom, Write};
use std::time::Duration;

use chrono::{Datelike, TimeZone, Utc};
use rstest::rstest;

use super::MemoryFileSystem;
use crate::watch::Watcher;
use crate::{
    default_file_time,
    Error,
    FileAccess,
    FileAttributes,
    FileShare,
    FileSystem,
    OpenMode,
    ReadFileSystem,
    SearchTarget,
    VfsPath,
};

fixtures!();

#[rstest]
fn test_create_directory_is_idempotent(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/a/b/c");
    memfs.create_directory(&path).unwrap();
    assert!(memfs.directory_exists(&path).unwrap());
    memfs.create_directory(&path).unwrap();
    assert!(memfs.directory_exists(&VfsPath::new("/a")).unwrap());
    assert!(memfs.directory_exists(&VfsPath::new("/a/b")).unwrap());
}

#[rstest]
fn test_create_directory_through_a_file_fails(memfs: MemoryFileSystem) {
    memfs.write_all(&VfsPath::new("/blocker"), b"").unwrap();
    assert!(matches!(
        memfs.create_directory(&VfsPath::new("/blocker/inner")),
        Err(Error::NotADirectory(_))
    ));
    assert!(matches!(
        memfs.create_directory(&VfsPath::new("/blocker")),
        Err(Error::NotADirectory(_))
    ));
}

#[rstest]
fn test_write_then_read_round_trip(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/data.bin");
    let payload = vec![0xde, 0xad, 0xbe, 0xef];
    memfs.write_all(&path, &payload).unwrap();
    assert_eq!(memfs.read_to_vec(&path).unwrap(), payload);
    assert_eq!(memfs.file_length(&path).unwrap(), 4);
}

#[rstest]
fn test_relative_paths_are_rejected(memfs: MemoryFileSystem) {
    let relative = VfsPath::new("not/absolute");
    assert!(matches!(
        memfs.file_exists(&relative),
        Err(Error::InvalidPath { .. })
    ));
    assert!(matches!(
        memfs.delete_file(&relative),
        Err(Error::InvalidPath { .. })
    ));
}

#[rstest]
fn test_copy_file_overwrite_guard(memfs: MemoryFileSystem) {
    let x = VfsPath::new("/x");
    let y = VfsPath::new("/y");
    memfs.write_all(&x, b"from x").unwrap();
    memfs.write_all(&y, b"from y").unwrap();

    assert!(matches!(
        memfs.copy_file(&x, &y, false),
        Err(Error::DestinationExists(_))
    ));
    assert_eq!(memfs.read_to_vec(&y).unwrap(), b"from y");

    memfs.copy_file(&x, &y, true).unwrap();
    assert_eq!(memfs.read_to_vec(&y).unwrap(), b"from x");
}

#[rstest]
fn test_copy_file_errors(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/dir")).unwrap();
    memfs.write_all(&VfsPath::new("/src"), b"x").unwrap();
    assert!(matches!(
        memfs.copy_file(&VfsPath::new("/missing"), &VfsPath::new("/out"), true),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        memfs.copy_file(&VfsPath::new("/dir"), &VfsPath::new("/out"), true),
        Err(Error::IsDirectory(_))
    ));
    assert!(matches!(
        memfs.copy_file(&VfsPath::new("/src"), &VfsPath::new("/dir"), true),
        Err(Error::IsDirectory(_))
    ));
}

#[rstest]
fn test_move_file(memfs: MemoryFileSystem) {
    let a = VfsPath::new("/a");
    let b = VfsPath::new("/b");
    memfs.write_all(&a, b"content").unwrap();

    memfs.move_file(&a, &b).unwrap();
    assert!(!memfs.file_exists(&a).unwrap());
    assert!(memfs.file_exists(&b).unwrap());
    assert_eq!(memfs.read_to_vec(&b).unwrap(), b"content");
}

#[rstest]
fn test_move_file_destination_conflicts(memfs: MemoryFileSystem) {
    memfs.write_all(&VfsPath::new("/a"), b"a").unwrap();
    memfs.write_all(&VfsPath::new("/b"), b"b").unwrap();
    memfs.create_directory(&VfsPath::new("/d")).unwrap();

    assert!(matches!(
        memfs.move_file(&VfsPath::new("/a"), &VfsPath::new("/b")),
        Err(Error::DestinationExists(_))
    ));
    assert!(matches!(
        memfs.move_file(&VfsPath::new("/a"), &VfsPath::new("/d")),
        Err(Error::DestinationExists(_))
    ));
}

#[rstest]
fn test_delete_directory_guards(memfs: MemoryFileSystem) {
    ensure(&memfs, "/d/e.txt", b"data");

    assert!(matches!(
        memfs.delete_directory(&VfsPath::new("/d"), false),
        Err(Error::DirectoryNotEmpty(_))
    ));
    memfs.delete_directory(&VfsPath::new("/d"), true).unwrap();
    assert!(!memfs.directory_exists(&VfsPath::new("/d")).unwrap());
    assert!(!memfs.file_exists(&VfsPath::new("/d/e.txt")).unwrap());
}

#[rstest]
fn test_delete_errors(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/dir")).unwrap();
    memfs.write_all(&VfsPath::new("/file"), b"x").unwrap();

    assert!(matches!(
        memfs.delete_file(&VfsPath::new("/dir")),
        Err(Error::IsDirectory(_))
    ));
    assert!(matches!(
        memfs.delete_file(&VfsPath::new("/missing")),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        memfs.delete_directory(&VfsPath::new("/file"), true),
        Err(Error::NotADirectory(_))
    ));
    assert!(matches!(
        memfs.delete_directory(&VfsPath::root(), true),
        Err(Error::AccessDenied(_))
    ));
}

#[rstest]
fn test_move_directory_carries_contents(memfs: MemoryFileSystem) {
    ensure(&memfs, "/src/deep/file.txt", b"payload");
    memfs.create_directory(&VfsPath::new("/dest-parent")).unwrap();

    memfs
        .move_directory(&VfsPath::new("/src"), &VfsPath::new("/dest-parent/moved"))
        .unwrap();
    assert!(!memfs.directory_exists(&VfsPath::new("/src")).unwrap());
    assert_eq!(
        memfs
            .read_to_vec(&VfsPath::new("/dest-parent/moved/deep/file.txt"))
            .unwrap(),
        b"payload"
    );
}

#[rstest]
fn test_move_directory_into_itself_fails(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/a")).unwrap();
    assert!(memfs
        .move_directory(&VfsPath::new("/a"), &VfsPath::new("/a/b"))
        .is_err());
}

#[rstest]
fn test_open_modes(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/file.txt");

    assert!(matches!(
        memfs.open_file(&path, OpenMode::Open, FileAccess::Read, FileShare::Read),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        memfs.open_file(&path, OpenMode::Truncate, FileAccess::Write, FileShare::None),
        Err(Error::NotFound(_))
    ));

    memfs.write_all(&path, b"0123456789").unwrap();

    assert!(matches!(
        memfs.open_file(&path, OpenMode::CreateNew, FileAccess::Write, FileShare::None),
        Err(Error::AlreadyExists(_))
    ));
    assert!(memfs
        .open_file(&path, OpenMode::Create, FileAccess::Read, FileShare::None)
        .is_err());

    {
        let mut appender = memfs
            .open_file(&path, OpenMode::Append, FileAccess::Write, FileShare::None)
            .unwrap();
        appender.write_all(b"-end").unwrap();
    }
    assert_eq!(memfs.read_to_vec(&path).unwrap(), b"0123456789-end");

    {
        let mut truncated = memfs
            .open_file(&path, OpenMode::Truncate, FileAccess::ReadWrite, FileShare::None)
            .unwrap();
        let mut rest = Vec::new();
        truncated.read_to_end(&mut rest).unwrap();
        assert!(rest.is_empty());
    }
    assert_eq!(memfs.file_length(&path).unwrap(), 0);
}

#[rstest]
fn test_open_on_a_directory_fails(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/dir")).unwrap();
    assert!(matches!(
        memfs.open_read(&VfsPath::new("/dir")),
        Err(Error::IsDirectory(_))
    ));
}

#[rstest]
fn test_streams_share_content(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/shared.txt");
    memfs.write_all(&path, b"before").unwrap();

    let mut writer = memfs
        .open_file(&path, OpenMode::Open, FileAccess::ReadWrite, FileShare::ReadWrite)
        .unwrap();
    writer.seek(SeekFrom::End(0)).unwrap();
    writer.write_all(b"-after").unwrap();
    writer.flush().unwrap();

    assert_eq!(memfs.read_to_vec(&path).unwrap(), b"before-after");
}

#[rstest]
fn test_read_only_stream_rejects_writes(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/locked.txt");
    memfs.write_all(&path, b"data").unwrap();
    let mut stream = memfs.open_read(&path).unwrap();
    assert!(stream.write_all(b"nope").is_err());
}

#[rstest]
fn test_enumerate_matches_filter_and_target(memfs: MemoryFileSystem) {
    ensure(&memfs, "/logs/a.log", b"1");
    ensure(&memfs, "/logs/b.txt", b"2");
    ensure(&memfs, "/logs/sub/c.log", b"3");

    let top: Vec<_> = memfs
        .enumerate(&VfsPath::new("/logs"), "*.log", false, SearchTarget::File)
        .unwrap()
        .collect::<crate::Result<_>>()
        .unwrap();
    assert_eq!(top, vec![VfsPath::new("/logs/a.log")]);

    let all: Vec<_> = memfs
        .enumerate(&VfsPath::new("/logs"), "*.log", true, SearchTarget::File)
        .unwrap()
        .collect::<crate::Result<_>>()
        .unwrap();
    assert_eq!(
        all,
        vec![VfsPath::new("/logs/a.log"), VfsPath::new("/logs/sub/c.log")]
    );

    let dirs: Vec<_> = memfs
        .enumerate(&VfsPath::new("/logs"), "*", false, SearchTarget::Directory)
        .unwrap()
        .collect::<crate::Result<_>>()
        .unwrap();
    assert_eq!(dirs, vec![VfsPath::new("/logs/sub")]);

    // every produced path is absolute and satisfies the filter
    for path in &all {
        assert!(path.is_absolute());
        assert!(path.file_name().ends_with(".log"));
    }
}

#[rstest]
fn test_enumerate_missing_directory_fails(memfs: MemoryFileSystem) {
    assert!(matches!(
        memfs.enumerate(&VfsPath::new("/void"), "*", false, SearchTarget::Both),
        Err(Error::NotFound(_))
    ));
}

#[rstest]
fn test_attributes(memfs: MemoryFileSystem) {
    memfs.create_directory(&VfsPath::new("/dir")).unwrap();
    memfs.write_all(&VfsPath::new("/file"), b"x").unwrap();

    assert!(memfs
        .attributes(&VfsPath::new("/dir"))
        .unwrap()
        .contains(FileAttributes::DIRECTORY));
    assert_eq!(
        memfs.attributes(&VfsPath::new("/file")).unwrap(),
        FileAttributes::NORMAL
    );

    memfs
        .set_attributes(&VfsPath::new("/file"), FileAttributes::READ_ONLY | FileAttributes::HIDDEN)
        .unwrap();
    let attributes = memfs.attributes(&VfsPath::new("/file")).unwrap();
    assert!(attributes.contains(FileAttributes::READ_ONLY));
    assert!(attributes.contains(FileAttributes::HIDDEN));

    assert!(matches!(
        memfs.attributes(&VfsPath::new("/missing")),
        Err(Error::NotFound(_))
    ));
}

#[rstest]
fn test_times(memfs: MemoryFileSystem) {
    // absent paths report the sentinel rather than failing
    let missing = memfs.last_write_time(&VfsPath::new("/missing")).unwrap();
    assert_eq!(missing, default_file_time());
    assert_eq!(missing.year(), 1601);

    let path = VfsPath::new("/file");
    memfs.write_all(&path, b"x").unwrap();
    assert!(memfs.last_write_time(&path).unwrap().year() >= 2024);

    let then = Utc.with_ymd_and_hms(2001, 2, 3, 4, 5, 6).unwrap();
    memfs.set_last_write_time(&path, then).unwrap();
    assert_eq!(memfs.last_write_time(&path).unwrap(), then);
    memfs.set_creation_time(&path, then).unwrap();
    assert_eq!(memfs.creation_time(&path).unwrap(), then);

    assert!(matches!(
        memfs.set_last_write_time(&VfsPath::new("/missing"), then),
        Err(Error::NotFound(_))
    ));
}

#[rstest]
fn test_replace_file(memfs: MemoryFileSystem) {
    let src = VfsPath::new("/incoming");
    let dest = VfsPath::new("/current");
    let backup = VfsPath::new("/previous");
    memfs.write_all(&src, b"new contents").unwrap();
    memfs.write_all(&dest, b"old contents").unwrap();

    memfs.replace_file(&src, &dest, Some(&backup), true).unwrap();
    assert!(!memfs.file_exists(&src).unwrap());
    assert_eq!(memfs.read_to_vec(&dest).unwrap(), b"new contents");
    assert_eq!(memfs.read_to_vec(&backup).unwrap(), b"old contents");
}

#[rstest]
fn test_replace_file_requires_both_sides(memfs: MemoryFileSystem) {
    memfs.write_all(&VfsPath::new("/src"), b"x").unwrap();
    assert!(matches!(
        memfs.replace_file(&VfsPath::new("/src"), &VfsPath::new("/missing"), None, true),
        Err(Error::NotFound(_))
    ));
}

#[rstest]
fn test_deleted_events_are_raised(memfs: MemoryFileSystem) {
    memfs.write_all(&VfsPath::new("/doomed.txt"), b"x").unwrap();
    let watcher = memfs.watch(&VfsPath::root()).unwrap();
    watcher.set_enabled(true);
    let events = std::sync::Arc::new(CollectingSubscriber::default());
    watcher.subscribe(events.clone());

    memfs.delete_file(&VfsPath::new("/doomed.txt")).unwrap();
    assert!(events.wait_for_changes(1, Duration::from_secs(2)));
    assert_eq!(
        events.changes()[0],
        (
            crate::watch::ChangeKind::Deleted,
            VfsPath::new("/doomed.txt"),
            None,
        )
    );
}

#[rstest]
fn test_native_path_conversion(memfs: MemoryFileSystem) {
    let path = VfsPath::new("/a/b.txt");
    let native = memfs.to_native_path(&path).unwrap();
    assert_eq!(memfs.from_native_path(&native).unwrap(), path);
}
