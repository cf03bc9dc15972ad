// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tar::Archive;
use tempfile::TempDir;

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
    VfsFile,
};
use crate::path::VfsPath;
use crate::watch::Watcher;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./tar_test.rs"]
mod tar_test;

/// A read-only filesystem over the contents of a tar archive.
///
/// The archive is unpacked into a temporary directory on open and
/// served through a native view of that directory; the extraction is
/// removed again when the last handle drops. This is not efficient for
/// very large archives but keeps reads simple and random-access.
///
/// Archives record only a modification time, so the creation and
/// last-access getters report the last write time as well.
#[derive(Clone)]
pub struct TarFileSystem {
    inner: Arc<Inner>,
}

struct Inner {
    archive: PathBuf,
    // held for its lifetime only; dropping it removes the extraction
    _extracted: TempDir,
    fs: crate::backend::NativeFileSystem,
}

impl TarFileSystem {
    /// Unpack the archive at the given native path and serve it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut archive = Archive::new(file);
        let extracted = tempfile::Builder::new().prefix("unifs-tar-").tempdir()?;
        archive.unpack(extracted.path())?;
        tracing::debug!(archive = ?path, into = ?extracted.path(), "unpacked tar archive");
        let fs = crate::backend::NativeFileSystem::new(extracted.path())?;
        Ok(Self {
            inner: Arc::new(Inner {
                archive: path.to_path_buf(),
                _extracted: extracted,
                fs,
            }),
        })
    }

    /// The native path of the backing archive.
    pub fn archive_path(&self) -> &Path {
        &self.inner.archive
    }

    fn denied<T>(path: &VfsPath) -> Result<T> {
        Err(Error::AccessDenied(path.clone()))
    }
}

impl std::fmt::Debug for TarFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TarFileSystem<{:?}>", self.inner.archive)
    }
}

impl ReadFileSystem for TarFileSystem {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.fs.directory_exists_impl(path)
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.fs.file_exists_impl(path)
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        self.inner.fs.file_length_impl(path)
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        self.inner.fs.open_read_impl(path)
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        Ok(self.inner.fs.attributes_impl(path)? | FileAttributes::READ_ONLY)
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.fs.last_write_time_impl(path)
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.fs.last_write_time_impl(path)
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.fs.last_write_time_impl(path)
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        self.inner.fs.enumerate_impl(path, pattern, recursive, target)
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        self.inner.fs.to_native_path_impl(path)
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        self.inner.fs.from_native_path_impl(path)
    }
}

impl FileSystem for TarFileSystem {
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
        self.inner.fs.open_read_impl(path)
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

    fn can_watch_impl(&self, _path: &VfsPath) -> bool {
        false
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        Err(Error::String(format!(
            "tar archives do not support watching '{path}'"
        )))
    }
}
