// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::filter::SearchPattern;
use crate::fs::{
    BackendId,
    FileAccess,
    FileAttributes,
    FileShare,
    FileSystem,
    OpenMode,
    Paths,
    ReadFileSystem,
    SearchTarget,
    SharedFileSystem,
    VfsFile,
};
use crate::path::VfsPath;
use crate::watch::Watcher;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./readonly_test.rs"]
mod readonly_test;

/// Exposes another filesystem with every mutation rejected.
///
/// Reads, enumeration and watching pass straight through; any write
/// operation fails with an access denied error. Reported attributes
/// carry the read-only bit.
#[derive(Clone)]
pub struct ReadOnlyFileSystem {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    delegate: SharedFileSystem,
}

impl ReadOnlyFileSystem {
    pub fn new(delegate: SharedFileSystem) -> Self {
        Self {
            inner: Arc::new(Inner { delegate }),
        }
    }

    fn denied<T>(path: &VfsPath) -> Result<T> {
        Err(Error::AccessDenied(path.clone()))
    }
}

impl std::fmt::Debug for ReadOnlyFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyFileSystem")
            .field("delegate", &self.inner.delegate)
            .finish()
    }
}

impl ReadFileSystem for ReadOnlyFileSystem {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.delegate.directory_exists_impl(path)
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.delegate.file_exists_impl(path)
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        self.inner.delegate.file_length_impl(path)
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        self.inner.delegate.open_read_impl(path)
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        Ok(self.inner.delegate.attributes_impl(path)? | FileAttributes::READ_ONLY)
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.creation_time_impl(path)
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.last_access_time_impl(path)
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.last_write_time_impl(path)
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        self.inner
            .delegate
            .enumerate_impl(path, pattern, recursive, target)
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        self.inner.delegate.to_native_path_impl(path)
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        self.inner.delegate.from_native_path_impl(path)
    }
}

impl FileSystem for ReadOnlyFileSystem {
    fn create_directory_impl(&self, path: &VfsPath) -> Result<()> {
        Self::denied(path)
    }

    fn move_directory_impl(&self, src: &VfsPath, _dest: &VfsPath) -> Result<()> {
        Self::denied(src)
    }

    fn delete_directory_impl(&self, path: &VfsPath, _recursive: bool) -> Result<()> {
        Self::denied(path)
    }

    fn copy_file_impl(&self, src: &VfsPath, _dest: &VfsPath, _overwrite: bool) -> Result<()> {
        Self::denied(src)
    }

    fn replace_file_impl(
        &self,
        src: &VfsPath,
        _dest: &VfsPath,
        _backup: Option<&VfsPath>,
        _ignore_metadata_errors: bool,
    ) -> Result<()> {
        Self::denied(src)
    }

    fn move_file_impl(&self, src: &VfsPath, _dest: &VfsPath) -> Result<()> {
        Self::denied(src)
    }

    fn delete_file_impl(&self, path: &VfsPath) -> Result<()> {
        Self::denied(path)
    }

    fn open_file_impl(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        _share: FileShare,
    ) -> Result<Box<dyn VfsFile>> {
        if access.can_write() || mode.requires_write() {
            return Self::denied(path);
        }
        self.inner.delegate.open_read_impl(path)
    }

    fn set_attributes_impl(&self, path: &VfsPath, _attributes: FileAttributes) -> Result<()> {
        Self::denied(path)
    }

    fn set_creation_time_impl(&self, path: &VfsPath, _time: DateTime<Utc>) -> Result<()> {
        Self::denied(path)
    }

    fn set_last_access_time_impl(&self, path: &VfsPath, _time: DateTime<Utc>) -> Result<()> {
        Self::denied(path)
    }

    fn set_last_write_time_impl(&self, path: &VfsPath, _time: DateTime<Utc>) -> Result<()> {
        Self::denied(path)
    }

    fn can_watch_impl(&self, path: &VfsPath) -> bool {
        self.inner.delegate.can_watch_impl(path)
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        self.inner.delegate.watch_impl(path)
    }
}
