// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! Backends built by wrapping and combining other backends.

mod aggregate;
mod readonly;
mod sub;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use aggregate::AggregateFileSystem;
pub use readonly::ReadOnlyFileSystem;
pub use sub::{SubFileSystem, SubRoot};

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
use crate::watch::{PathConverter, Watcher, WrapWatcher};
use crate::Result;

/// Translates paths between a wrapper's namespace and its delegate's.
pub trait PathMapper: std::fmt::Debug + Send + Sync + 'static {
    /// The delegate path corresponding to a wrapper path.
    fn to_delegate(&self, path: &VfsPath) -> VfsPath;

    /// The wrapper path corresponding to a delegate path.
    ///
    /// Fails when the delegate path has no representation in the
    /// wrapper's namespace.
    fn from_delegate(&self, path: &VfsPath) -> Result<VfsPath>;

    /// Conversion used when forwarding watch events; None drops the
    /// event instead of failing the operation.
    fn try_from_delegate(&self, path: &VfsPath) -> Option<VfsPath> {
        self.from_delegate(path).ok()
    }
}

/// A filesystem that exposes another one through a path translation.
///
/// Every operation maps the caller's path into the delegate's
/// namespace, invokes the delegate, and maps any returned paths back.
/// Enumeration stays lazy, translating element-wise. Watching wraps the
/// delegate's watcher so emitted paths are translated as well.
pub struct ComposedFileSystem<M: PathMapper> {
    inner: Arc<Inner<M>>,
}

#[derive(Debug)]
struct Inner<M> {
    delegate: SharedFileSystem,
    mapper: M,
}

impl<M: PathMapper> ComposedFileSystem<M> {
    pub fn with_mapper(delegate: SharedFileSystem, mapper: M) -> Self {
        Self {
            inner: Arc::new(Inner { delegate, mapper }),
        }
    }

    pub fn delegate(&self) -> &SharedFileSystem {
        &self.inner.delegate
    }

    pub fn mapper(&self) -> &M {
        &self.inner.mapper
    }

    fn map(&self, path: &VfsPath) -> VfsPath {
        self.inner.mapper.to_delegate(path)
    }
}

impl<M: PathMapper> Clone for ComposedFileSystem<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: PathMapper> std::fmt::Debug for ComposedFileSystem<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedFileSystem")
            .field("mapper", &self.inner.mapper)
            .field("delegate", &self.inner.delegate)
            .finish()
    }
}

impl<M: PathMapper> ReadFileSystem for ComposedFileSystem<M> {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.delegate.directory_exists_impl(&self.map(path))
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        self.inner.delegate.file_exists_impl(&self.map(path))
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        self.inner.delegate.file_length_impl(&self.map(path))
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        self.inner.delegate.open_read_impl(&self.map(path))
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        self.inner.delegate.attributes_impl(&self.map(path))
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.creation_time_impl(&self.map(path))
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.last_access_time_impl(&self.map(path))
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.inner.delegate.last_write_time_impl(&self.map(path))
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        let entries =
            self.inner
                .delegate
                .enumerate_impl(&self.map(path), pattern, recursive, target)?;
        let inner = Arc::clone(&self.inner);
        Ok(Box::new(entries.map(move |entry| {
            entry.and_then(|path| inner.mapper.from_delegate(&path))
        })))
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        self.inner.delegate.to_native_path_impl(&self.map(path))
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        let delegate_path = self.inner.delegate.from_native_path_impl(path)?;
        self.inner.mapper.from_delegate(&delegate_path)
    }
}

impl<M: PathMapper> FileSystem for ComposedFileSystem<M> {
    fn create_directory_impl(&self, path: &VfsPath) -> Result<()> {
        self.inner.delegate.create_directory_impl(&self.map(path))
    }

    fn move_directory_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        self.inner
            .delegate
            .move_directory_impl(&self.map(src), &self.map(dest))
    }

    fn delete_directory_impl(&self, path: &VfsPath, recursive: bool) -> Result<()> {
        self.inner
            .delegate
            .delete_directory_impl(&self.map(path), recursive)
    }

    fn copy_file_impl(&self, src: &VfsPath, dest: &VfsPath, overwrite: bool) -> Result<()> {
        self.inner
            .delegate
            .copy_file_impl(&self.map(src), &self.map(dest), overwrite)
    }

    fn replace_file_impl(
        &self,
        src: &VfsPath,
        dest: &VfsPath,
        backup: Option<&VfsPath>,
        ignore_metadata_errors: bool,
    ) -> Result<()> {
        let backup = backup.map(|p| self.map(p));
        self.inner.delegate.replace_file_impl(
            &self.map(src),
            &self.map(dest),
            backup.as_ref(),
            ignore_metadata_errors,
        )
    }

    fn move_file_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        self.inner
            .delegate
            .move_file_impl(&self.map(src), &self.map(dest))
    }

    fn delete_file_impl(&self, path: &VfsPath) -> Result<()> {
        self.inner.delegate.delete_file_impl(&self.map(path))
    }

    fn open_file_impl(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        share: FileShare,
    ) -> Result<Box<dyn VfsFile>> {
        self.inner
            .delegate
            .open_file_impl(&self.map(path), mode, access, share)
    }

    fn set_attributes_impl(&self, path: &VfsPath, attributes: FileAttributes) -> Result<()> {
        self.inner
            .delegate
            .set_attributes_impl(&self.map(path), attributes)
    }

    fn set_creation_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.inner
            .delegate
            .set_creation_time_impl(&self.map(path), time)
    }

    fn set_last_access_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.inner
            .delegate
            .set_last_access_time_impl(&self.map(path), time)
    }

    fn set_last_write_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.inner
            .delegate
            .set_last_write_time_impl(&self.map(path), time)
    }

    fn can_watch_impl(&self, path: &VfsPath) -> bool {
        self.inner.delegate.can_watch_impl(&self.map(path))
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        let delegate_watcher = self.inner.delegate.watch_impl(&self.map(path))?;
        let inner = Arc::clone(&self.inner);
        let convert: PathConverter = Arc::new(move |p| inner.mapper.try_from_delegate(p));
        let fs: SharedFileSystem = Arc::new(self.clone());
        Ok(Box::new(WrapWatcher::new(
            fs,
            path.clone(),
            delegate_watcher,
            convert,
        )))
    }
}
