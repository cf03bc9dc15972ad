// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

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
    VfsFile,
};
use crate::path::VfsPath;
use crate::watch::Watcher;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./native_test.rs"]
mod native_test;

/// A view of the operating system's filesystem below a root directory.
///
/// Every absolute path is resolved against the root; canonical paths
/// carry no `..` segments, so the view cannot escape it. Change
/// watching is not supported by this backend.
#[derive(Clone)]
pub struct NativeFileSystem {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    root: PathBuf,
}

impl NativeFileSystem {
    /// Open a view rooted at an existing native directory.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self> {
        let root = root.into();
        let metadata = fs::metadata(&root)?;
        if !metadata.is_dir() {
            return Err(Error::invalid_path(
                root.to_string_lossy(),
                "the root of a native filesystem must be a directory",
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner { root }),
        })
    }

    /// The native directory this filesystem is rooted at.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    fn resolve(&self, path: &VfsPath) -> PathBuf {
        self.inner.root.join(path.to_relative().as_str())
    }

    fn vfs_path_for(&self, native: &Path) -> Result<VfsPath> {
        let relative = native.strip_prefix(&self.inner.root).map_err(|_| {
            Error::invalid_path(
                native.to_string_lossy(),
                "the native path is outside of this filesystem's root",
            )
        })?;
        let mut converted = VfsPath::root();
        for component in relative.components() {
            converted = converted.join(component.as_os_str().to_string_lossy());
        }
        Ok(converted)
    }
}

impl std::fmt::Debug for NativeFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFileSystem<{:?}>", self.inner.root)
    }
}

fn time_or_default(time: std::io::Result<SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| default_file_time())
}

impl ReadFileSystem for NativeFileSystem {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        Ok(fs::metadata(self.resolve(path))
            .map(|m| m.is_dir())
            .unwrap_or(false))
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        Ok(fs::metadata(self.resolve(path))
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        let metadata =
            fs::metadata(self.resolve(path)).map_err(|err| Error::from_io(err, path))?;
        if metadata.is_dir() {
            return Err(Error::NotFound(path.clone()));
        }
        Ok(metadata.len())
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        let native = self.resolve(path);
        let metadata = fs::metadata(&native).map_err(|err| Error::from_io(err, path))?;
        if metadata.is_dir() {
            return Err(Error::IsDirectory(path.clone()));
        }
        let file = fs::File::open(&native).map_err(|err| Error::from_io(err, path))?;
        Ok(Box::new(file))
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        let metadata =
            fs::metadata(self.resolve(path)).map_err(|err| Error::from_io(err, path))?;
        let mut attributes = FileAttributes::empty();
        if metadata.permissions().readonly() {
            attributes |= FileAttributes::READ_ONLY;
        }
        if metadata.is_dir() {
            attributes |= FileAttributes::DIRECTORY;
        }
        if path.file_name().starts_with('.') {
            attributes |= FileAttributes::HIDDEN;
        }
        if attributes.is_empty() {
            attributes = FileAttributes::NORMAL;
        }
        Ok(attributes)
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        Ok(fs::metadata(self.resolve(path))
            .map(|m| time_or_default(m.created()))
            .unwrap_or_else(|_| default_file_time()))
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        Ok(fs::metadata(self.resolve(path))
            .map(|m| time_or_default(m.accessed()))
            .unwrap_or_else(|_| default_file_time()))
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        Ok(fs::metadata(self.resolve(path))
            .map(|m| time_or_default(m.modified()))
            .unwrap_or_else(|_| default_file_time()))
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        let native = self.resolve(path);
        if !self.directory_exists_impl(path)? {
            return Err(Error::NotFound(path.clone()));
        }
        let this = self.clone();
        if recursive {
            let walker = walkdir::WalkDir::new(native)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter();
            Ok(Box::new(walker.filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(err.into())),
                };
                let wanted = if entry.file_type().is_dir() {
                    target.wants_directories()
                } else {
                    target.wants_files()
                };
                if !wanted || !pattern.matches(&entry.file_name().to_string_lossy()) {
                    return None;
                }
                Some(this.vfs_path_for(entry.path()))
            })))
        } else {
            let entries = fs::read_dir(native).map_err(|err| Error::from_io(err, path))?;
            Ok(Box::new(entries.filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => return Some(Err(err.into())),
                };
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let wanted = if is_dir {
                    target.wants_directories()
                } else {
                    target.wants_files()
                };
                if !wanted || !pattern.matches(&entry.file_name().to_string_lossy()) {
                    return None;
                }
                Some(this.vfs_path_for(&entry.path()))
            })))
        }
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        Ok(self.resolve(path))
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        self.vfs_path_for(path)
    }
}

impl FileSystem for NativeFileSystem {
    fn create_directory_impl(&self, path: &VfsPath) -> Result<()> {
        fs::create_dir_all(self.resolve(path)).map_err(|err| Error::from_io(err, path))
    }

    fn move_directory_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        if !self.directory_exists_impl(src)? {
            return Err(Error::NotFound(src.clone()));
        }
        if self.file_exists_impl(dest)? || self.directory_exists_impl(dest)? {
            return Err(Error::DestinationExists(dest.clone()));
        }
        fs::rename(self.resolve(src), self.resolve(dest))
            .map_err(|err| Error::from_io(err, src))
    }

    fn delete_directory_impl(&self, path: &VfsPath, recursive: bool) -> Result<()> {
        let native = self.resolve(path);
        let metadata = fs::metadata(&native).map_err(|err| Error::from_io(err, path))?;
        if !metadata.is_dir() {
            return Err(Error::NotADirectory(path.clone()));
        }
        if recursive {
            return fs::remove_dir_all(&native).map_err(|err| Error::from_io(err, path));
        }
        let mut entries = fs::read_dir(&native).map_err(|err| Error::from_io(err, path))?;
        if entries.next().is_some() {
            return Err(Error::DirectoryNotEmpty(path.clone()));
        }
        fs::remove_dir(&native).map_err(|err| Error::from_io(err, path))
    }

    fn copy_file_impl(&self, src: &VfsPath, dest: &VfsPath, overwrite: bool) -> Result<()> {
        if !self.file_exists_impl(src)? {
            if self.directory_exists_impl(src)? {
                return Err(Error::IsDirectory(src.clone()));
            }
            return Err(Error::NotFound(src.clone()));
        }
        if self.directory_exists_impl(dest)? {
            return Err(Error::IsDirectory(dest.clone()));
        }
        if !overwrite && self.file_exists_impl(dest)? {
            return Err(Error::DestinationExists(dest.clone()));
        }
        fs::copy(self.resolve(src), self.resolve(dest))
            .map(|_| ())
            .map_err(|err| Error::from_io(err, src))
    }

    fn move_file_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        if !self.file_exists_impl(src)? {
            if self.directory_exists_impl(src)? {
                return Err(Error::IsDirectory(src.clone()));
            }
            return Err(Error::NotFound(src.clone()));
        }
        if self.file_exists_impl(dest)? || self.directory_exists_impl(dest)? {
            return Err(Error::DestinationExists(dest.clone()));
        }
        fs::rename(self.resolve(src), self.resolve(dest))
            .map_err(|err| Error::from_io(err, src))
    }

    fn delete_file_impl(&self, path: &VfsPath) -> Result<()> {
        let native = self.resolve(path);
        let metadata = fs::metadata(&native).map_err(|err| Error::from_io(err, path))?;
        if metadata.is_dir() {
            return Err(Error::IsDirectory(path.clone()));
        }
        fs::remove_file(&native).map_err(|err| Error::from_io(err, path))
    }

    fn open_file_impl(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        _share: FileShare,
    ) -> Result<Box<dyn VfsFile>> {
        if mode.requires_write() && !access.can_write() {
            return Err(Error::String(format!(
                "open mode {mode:?} requires write access"
            )));
        }
        let mut options = fs::OpenOptions::new();
        options.read(access.can_read()).write(access.can_write());
        match mode {
            OpenMode::CreateNew => {
                options.create_new(true);
            }
            OpenMode::Create => {
                options.create(true).truncate(true);
            }
            OpenMode::Open => (),
            OpenMode::OpenOrCreate => {
                if access.can_write() {
                    options.create(true);
                } else if !self.file_exists_impl(path)? {
                    // the OS cannot create through a read-only handle
                    fs::OpenOptions::new()
                        .write(true)
                        .create(true)
                        .open(self.resolve(path))
                        .map_err(|err| Error::from_io(err, path))?;
                }
            }
            OpenMode::Truncate => {
                if !self.file_exists_impl(path)? {
                    return Err(Error::NotFound(path.clone()));
                }
                options.truncate(true);
            }
            OpenMode::Append => {
                options.create(true).append(true);
            }
        }
        let file = options
            .open(self.resolve(path))
            .map_err(|err| Error::from_io(err, path))?;
        Ok(Box::new(file))
    }

    fn set_attributes_impl(&self, path: &VfsPath, attributes: FileAttributes) -> Result<()> {
        let native = self.resolve(path);
        let metadata = fs::metadata(&native).map_err(|err| Error::from_io(err, path))?;
        let mut permissions = metadata.permissions();
        permissions.set_readonly(attributes.contains(FileAttributes::READ_ONLY));
        // remaining bits have no native representation here and are
        // accepted without effect
        fs::set_permissions(&native, permissions).map_err(|err| Error::from_io(err, path))
    }

    fn set_creation_time_impl(&self, path: &VfsPath, _time: DateTime<Utc>) -> Result<()> {
        if !self.file_exists_impl(path)? && !self.directory_exists_impl(path)? {
            return Err(Error::NotFound(path.clone()));
        }
        // creation times cannot be set portably; accepted without effect
        tracing::debug!(%path, "ignoring creation time update");
        Ok(())
    }

    fn set_last_access_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        let file = fs::File::open(self.resolve(path)).map_err(|err| Error::from_io(err, path))?;
        let times = fs::FileTimes::new().set_accessed(SystemTime::from(time));
        file.set_times(times).map_err(|err| Error::from_io(err, path))
    }

    fn set_last_write_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        let file = fs::File::open(self.resolve(path)).map_err(|err| Error::from_io(err, path))?;
        let times = fs::FileTimes::new().set_modified(SystemTime::from(time));
        file.set_times(times).map_err(|err| Error::from_io(err, path))
    }

    fn can_watch_impl(&self, _path: &VfsPath) -> bool {
        false
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        Err(Error::String(format!(
            "the native filesystem does not support watching '{path}'"
        )))
    }
}
