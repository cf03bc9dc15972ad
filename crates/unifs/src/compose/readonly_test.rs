// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use rstest::rstest;

use super::ReadOnlyFileSystem;
use crate::backend::MemoryFileSystem;
use crate::{
    Error,
    FileAccess,
    FileAttributes,
    FileShare,
    FileSystem,
    OpenMode,
    ReadFileSystem,
    VfsPath,
};

fixtures!();

#[rstest]
fn test_reads_pass_through(memfs: MemoryFileSystem) {
    ensure(&memfs, "/data/file.txt", b"content");
    let readonly = ReadOnlyFileSystem::new(shared(&memfs));

    assert!(readonly.file_exists(&VfsPath::new("/data/file.txt")).unwrap());
    assert_eq!(
        readonly.read_to_vec(&VfsPath::new("/data/file.txt")).unwrap(),
        b"content"
    );
    assert_eq!(
        readonly.file_length(&VfsPath::new("/data/file.txt")).unwrap(),
        7
    );
}

#[rstest]
fn test_attributes_carry_the_readonly_bit(memfs: MemoryFileSystem) {
    ensure(&memfs, "/file.txt", b"x");
    let readonly = ReadOnlyFileSystem::new(shared(&memfs));
    let attributes = readonly.attributes(&VfsPath::new("/file.txt")).unwrap();
    assert!(attributes.contains(FileAttributes::READ_ONLY));
}

#[rstest]
fn test_every_mutation_is_denied(memfs: MemoryFileSystem) {
    ensure(&memfs, "/file.txt", b"x");
    ensure(&memfs, "/dir/inner.txt", b"y");
    let readonly = ReadOnlyFileSystem::new(shared(&memfs));

    let denied = |result: crate::Result<()>| {
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    };
    denied(readonly.create_directory(&VfsPath::new("/new")));
    denied(readonly.delete_file(&VfsPath::new("/file.txt")));
    denied(readonly.delete_directory(&VfsPath::new("/dir"), true));
    denied(readonly.write_all(&VfsPath::new("/file.txt"), b"nope"));
    denied(readonly.copy_file(&VfsPath::new("/file.txt"), &VfsPath::new("/copy.txt"), true));
    denied(readonly.move_file(&VfsPath::new("/file.txt"), &VfsPath::new("/moved.txt")));
    denied(readonly.set_attributes(&VfsPath::new("/file.txt"), FileAttributes::HIDDEN));

    // the delegate is untouched
    assert_eq!(memfs.read_to_vec(&VfsPath::new("/file.txt")).unwrap(), b"x");
}

#[rstest]
fn test_read_only_open_still_works(memfs: MemoryFileSystem) {
    ensure(&memfs, "/file.txt", b"x");
    let readonly = ReadOnlyFileSystem::new(shared(&memfs));
    assert!(readonly
        .open_file(
            &VfsPath::new("/file.txt"),
            OpenMode::Open,
            FileAccess::Read,
            FileShare::Read,
        )
        .is_ok());
    assert!(matches!(
        readonly.open_file(
            &VfsPath::new("/file.txt"),
            OpenMode::Open,
            FileAccess::ReadWrite,
            FileShare::None,
        ),
        Err(Error::AccessDenied(_))
    ));
}

#[rstest]
fn test_watching_passes_through(memfs: MemoryFileSystem) {
    let readonly = ReadOnlyFileSystem::new(shared(&memfs));
    assert!(readonly.can_watch(&VfsPath::root()).unwrap());
    assert!(readonly.watch(&VfsPath::root()).is_ok());
}
