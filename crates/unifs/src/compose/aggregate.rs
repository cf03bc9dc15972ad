// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::filter::SearchPattern;
use crate::fs::{
    default_file_time,
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
use crate::watch::{AggregateWatcher, Watcher};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./aggregate_test.rs"]
mod aggregate_test;

/// A read-only union over an ordered list of delegate filesystems.
///
/// Reads resolve against the first delegate that has the requested
/// entry; enumeration merges all delegates, earlier ones shadowing
/// later ones. Watching fans the delegates' watchers into a single
/// aggregate watcher. All mutation is rejected.
#[derive(Clone)]
pub struct AggregateFileSystem {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    delegates: RwLock<Vec<SharedFileSystem>>,
}

impl AggregateFileSystem {
    pub fn new() -> Self {
        Self::with_delegates(Vec::new())
    }

    pub fn with_delegates(delegates: Vec<SharedFileSystem>) -> Self {
        Self {
            inner: Arc::new(Inner {
                delegates: RwLock::new(delegates),
            }),
        }
    }

    /// Append a delegate with the lowest precedence.
    pub fn add_delegate(&self, delegate: SharedFileSystem) {
        self.inner.delegates.write().push(delegate);
    }

    /// Remove every occurrence of the given backend.
    pub fn remove_delegate(&self, delegate: &SharedFileSystem) {
        self.inner
            .delegates
            .write()
            .retain(|d| d.identity() != delegate.identity());
    }

    fn delegates(&self) -> Vec<SharedFileSystem> {
        self.inner.delegates.read().clone()
    }

    /// The first delegate holding a file at the given path.
    fn find_file(&self, path: &VfsPath) -> Result<Option<SharedFileSystem>> {
        for delegate in self.delegates() {
            if delegate.file_exists_impl(path)? {
                return Ok(Some(delegate));
            }
        }
        Ok(None)
    }

    /// The first delegate holding any entry at the given path.
    fn find_entry(&self, path: &VfsPath) -> Result<Option<SharedFileSystem>> {
        for delegate in self.delegates() {
            if delegate.file_exists_impl(path)? || delegate.directory_exists_impl(path)? {
                return Ok(Some(delegate));
            }
        }
        Ok(None)
    }

    fn denied<T>(path: &VfsPath) -> Result<T> {
        Err(Error::AccessDenied(path.clone()))
    }
}

impl Default for AggregateFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AggregateFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateFileSystem")
            .field("delegates", &self.inner.delegates.read().len())
            .finish()
    }
}

impl ReadFileSystem for AggregateFileSystem {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        for delegate in self.delegates() {
            if delegate.directory_exists_impl(path)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        Ok(self.find_file(path)?.is_some())
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        match self.find_file(path)? {
            Some(delegate) => delegate.file_length_impl(path),
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        match self.find_file(path)? {
            Some(delegate) => delegate.open_read_impl(path),
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        match self.find_entry(path)? {
            Some(delegate) => Ok(delegate.attributes_impl(path)? | FileAttributes::READ_ONLY),
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        match self.find_entry(path)? {
            Some(delegate) => delegate.creation_time_impl(path),
            None => Ok(default_file_time()),
        }
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        match self.find_entry(path)? {
            Some(delegate) => delegate.last_access_time_impl(path),
            None => Ok(default_file_time()),
        }
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        match self.find_entry(path)? {
            Some(delegate) => delegate.last_write_time_impl(path),
            None => Ok(default_file_time()),
        }
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        let mut found = false;
        for delegate in self.delegates() {
            if !delegate.directory_exists_impl(path)? {
                continue;
            }
            found = true;
            let entries = delegate.enumerate_impl(path, pattern.clone(), recursive, target)?;
            for entry in entries {
                let entry = entry?;
                if seen.insert(entry.clone()) {
                    merged.push(entry);
                }
            }
        }
        if !found {
            return Err(Error::NotFound(path.clone()));
        }
        Ok(Box::new(merged.into_iter().map(Ok::<VfsPath, Error>)))
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        match self.find_entry(path)? {
            Some(delegate) => delegate.to_native_path_impl(path),
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        for delegate in self.delegates() {
            if let Ok(converted) = delegate.from_native_path_impl(path) {
                return Ok(converted);
            }
        }
        Err(Error::invalid_path(
            path.to_string_lossy(),
            "no delegate recognizes this native path",
        ))
    }
}

impl FileSystem for AggregateFileSystem {
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
        self.open_read_impl(path)
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
        self.delegates()
            .iter()
            .any(|delegate| delegate.can_watch_impl(path))
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        let fs: SharedFileSystem = Arc::new(self.clone());
        let watcher = AggregateWatcher::new(fs, path.clone());
        for delegate in self.delegates() {
            if delegate.can_watch_impl(path) {
                watcher.add(delegate.watch_impl(path)?);
            }
        }
        Ok(Box::new(watcher))
    }
}
