// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

mod types;

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use types::{
    default_file_time,
    FileAccess,
    FileAttributes,
    FileShare,
    OpenMode,
    SearchTarget,
};

use crate::filter::SearchPattern;
use crate::path::VfsPath;
use crate::watch::Watcher;
use crate::{Error, Result};

/// A filesystem shared between owners, e.g. a wrapper and its creator.
pub type SharedFileSystem = Arc<dyn FileSystem>;

/// An open byte stream into a filesystem.
///
/// Streams opened without write access fail writes at the stream level.
/// Every stream holds backend resources until dropped.
pub trait VfsFile: Read + Write + Seek + Send {}

impl<T> VfsFile for T where T: Read + Write + Seek + Send {}

/// A lazy sequence of absolute paths produced by an enumeration.
pub type Paths<'a> = Box<dyn Iterator<Item = Result<VfsPath>> + Send + 'a>;

/// Identifies a backend's shared state.
///
/// Clones of a backend handle compare equal; independently created
/// backends never do. Used by aggregates to remove watchers by the
/// backend they observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(pub(crate) usize);

impl BackendId {
    /// The identity of a backend whose state lives behind the given Arc.
    pub(crate) fn of<T>(state: &Arc<T>) -> BackendId {
        BackendId(Arc::as_ptr(state) as usize)
    }
}

/// The read half of the filesystem protocol.
///
/// Callers use the un-suffixed methods, which validate that the target
/// path is absolute before forwarding to the corresponding `*_impl`
/// method. Backends implement only the `*_impl` surface and are never
/// handed a relative path. Paths are canonical by construction of
/// [`VfsPath`].
pub trait ReadFileSystem: std::fmt::Debug + Send + Sync {
    fn identity(&self) -> BackendId;

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool>;
    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool>;
    fn file_length_impl(&self, path: &VfsPath) -> Result<u64>;
    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>>;
    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes>;
    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>>;
    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>>;
    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>>;
    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>>;
    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf>;
    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath>;

    /// True if a directory exists at the given path.
    fn directory_exists(&self, path: &VfsPath) -> Result<bool> {
        self.directory_exists_impl(path.check_absolute()?)
    }

    /// True if a file exists at the given path.
    fn file_exists(&self, path: &VfsPath) -> Result<bool> {
        self.file_exists_impl(path.check_absolute()?)
    }

    /// The size in bytes of the file at the given path.
    fn file_length(&self, path: &VfsPath) -> Result<u64> {
        self.file_length_impl(path.check_absolute()?)
    }

    /// Open the file at the given path for reading.
    fn open_read(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        self.open_read_impl(path.check_absolute()?)
    }

    /// The attributes of the file or directory at the given path.
    fn attributes(&self, path: &VfsPath) -> Result<FileAttributes> {
        self.attributes_impl(path.check_absolute()?)
    }

    /// When the entry at the given path was created.
    ///
    /// Yields [`default_file_time`] when the path does not exist or the
    /// backend does not record this time.
    fn creation_time(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.creation_time_impl(path.check_absolute()?)
    }

    /// When the entry at the given path was last accessed.
    fn last_access_time(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.last_access_time_impl(path.check_absolute()?)
    }

    /// When the entry at the given path was last written.
    fn last_write_time(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        self.last_write_time_impl(path.check_absolute()?)
    }

    /// Lazily enumerate paths under a directory.
    ///
    /// `filter` matches final name segments, see [`SearchPattern`].
    fn enumerate(
        &self,
        path: &VfsPath,
        filter: &str,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        let pattern = SearchPattern::parse(filter)?;
        self.enumerate_impl(path.check_absolute()?, pattern, recursive, target)
    }

    /// Translate a path into the backend's native representation.
    fn to_native_path(&self, path: &VfsPath) -> Result<PathBuf> {
        self.to_native_path_impl(path.check_absolute()?)
    }

    /// Translate a native path back into this filesystem's namespace.
    fn from_native_path(&self, path: &Path) -> Result<VfsPath> {
        self.from_native_path_impl(path)
    }

    /// Read the entire file at the given path.
    fn read_to_vec(&self, path: &VfsPath) -> Result<Vec<u8>> {
        let mut stream = self.open_read(path)?;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Read the entire file at the given path as utf-8 text.
    fn read_to_string(&self, path: &VfsPath) -> Result<String> {
        let mut stream = self.open_read(path)?;
        let mut text = String::new();
        stream.read_to_string(&mut text)?;
        Ok(text)
    }
}

/// The full filesystem protocol: reads plus mutation and watching.
///
/// The same validation seam applies: public methods reject relative
/// paths with an invalid path error and forward to the `*_impl`
/// surface.
pub trait FileSystem: ReadFileSystem {
    fn create_directory_impl(&self, path: &VfsPath) -> Result<()>;
    fn move_directory_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()>;
    fn delete_directory_impl(&self, path: &VfsPath, recursive: bool) -> Result<()>;
    fn copy_file_impl(&self, src: &VfsPath, dest: &VfsPath, overwrite: bool) -> Result<()>;
    fn move_file_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()>;
    fn delete_file_impl(&self, path: &VfsPath) -> Result<()>;
    fn open_file_impl(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        share: FileShare,
    ) -> Result<Box<dyn VfsFile>>;
    fn set_attributes_impl(&self, path: &VfsPath, attributes: FileAttributes) -> Result<()>;
    fn set_creation_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()>;
    fn set_last_access_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()>;
    fn set_last_write_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()>;
    fn can_watch_impl(&self, path: &VfsPath) -> bool;
    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>>;

    /// Replace `dest` with `src`, optionally keeping the old content.
    ///
    /// The default realization moves the old destination aside (to
    /// `backup` when given, otherwise deleting it), moves the source
    /// into place, and then restores the replaced file's attributes and
    /// write time onto the result. Metadata restoration is best-effort;
    /// failures there are only reported when `ignore_metadata_errors`
    /// is false.
    fn replace_file_impl(
        &self,
        src: &VfsPath,
        dest: &VfsPath,
        backup: Option<&VfsPath>,
        ignore_metadata_errors: bool,
    ) -> Result<()> {
        if !self.file_exists_impl(src)? {
            return Err(Error::NotFound(src.clone()));
        }
        if !self.file_exists_impl(dest)? {
            return Err(Error::NotFound(dest.clone()));
        }
        let preserved = self
            .attributes_impl(dest)
            .and_then(|attrs| Ok((attrs, self.last_write_time_impl(dest)?)));
        match backup {
            Some(backup) => {
                if self.file_exists_impl(backup)? {
                    self.delete_file_impl(backup)?;
                }
                self.move_file_impl(dest, backup)?;
            }
            None => self.delete_file_impl(dest)?,
        }
        self.move_file_impl(src, dest)?;

        let restored = preserved.and_then(|(attrs, written)| {
            self.set_attributes_impl(dest, attrs)?;
            self.set_last_write_time_impl(dest, written)
        });
        match restored {
            Ok(()) => Ok(()),
            Err(err) if ignore_metadata_errors => {
                tracing::debug!(?err, %dest, "ignoring metadata restoration failure");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Create a directory, including any missing parents.
    ///
    /// Succeeds without effect when the directory already exists.
    fn create_directory(&self, path: &VfsPath) -> Result<()> {
        self.create_directory_impl(path.check_absolute()?)
    }

    /// Move a directory and everything under it.
    fn move_directory(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        self.move_directory_impl(src.check_absolute()?, dest.check_absolute()?)
    }

    /// Delete a directory.
    ///
    /// A non-recursive delete of a populated directory fails with a
    /// directory-not-empty error.
    fn delete_directory(&self, path: &VfsPath, recursive: bool) -> Result<()> {
        self.delete_directory_impl(path.check_absolute()?, recursive)
    }

    /// Copy a file, optionally over an existing destination file.
    fn copy_file(&self, src: &VfsPath, dest: &VfsPath, overwrite: bool) -> Result<()> {
        self.copy_file_impl(src.check_absolute()?, dest.check_absolute()?, overwrite)
    }

    /// See [`FileSystem::replace_file_impl`].
    fn replace_file(
        &self,
        src: &VfsPath,
        dest: &VfsPath,
        backup: Option<&VfsPath>,
        ignore_metadata_errors: bool,
    ) -> Result<()> {
        if let Some(backup) = backup {
            backup.check_absolute()?;
        }
        self.replace_file_impl(
            src.check_absolute()?,
            dest.check_absolute()?,
            backup,
            ignore_metadata_errors,
        )
    }

    /// Move a file, failing if anything exists at the destination.
    fn move_file(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        self.move_file_impl(src.check_absolute()?, dest.check_absolute()?)
    }

    /// Delete a file.
    fn delete_file(&self, path: &VfsPath) -> Result<()> {
        self.delete_file_impl(path.check_absolute()?)
    }

    /// Open a byte stream on a file.
    fn open_file(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        share: FileShare,
    ) -> Result<Box<dyn VfsFile>> {
        self.open_file_impl(path.check_absolute()?, mode, access, share)
    }

    /// Set the attributes of a file or directory.
    fn set_attributes(&self, path: &VfsPath, attributes: FileAttributes) -> Result<()> {
        self.set_attributes_impl(path.check_absolute()?, attributes)
    }

    fn set_creation_time(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.set_creation_time_impl(path.check_absolute()?, time)
    }

    fn set_last_access_time(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.set_last_access_time_impl(path.check_absolute()?, time)
    }

    fn set_last_write_time(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        self.set_last_write_time_impl(path.check_absolute()?, time)
    }

    /// True if this backend can produce change events for the path.
    fn can_watch(&self, path: &VfsPath) -> Result<bool> {
        Ok(self.can_watch_impl(path.check_absolute()?))
    }

    /// Watch the directory at the given path for changes.
    fn watch(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        self.watch_impl(path.check_absolute()?)
    }

    /// Create or replace the file at the given path with `data`.
    fn write_all(&self, path: &VfsPath, data: &[u8]) -> Result<()> {
        let mut stream = self.open_file(
            path,
            OpenMode::Create,
            FileAccess::Write,
            FileShare::None,
        )?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    /// Append `data` to the file at the given path, creating it first
    /// if needed.
    fn append_all(&self, path: &VfsPath, data: &[u8]) -> Result<()> {
        let mut stream = self.open_file(
            path,
            OpenMode::Append,
            FileAccess::Write,
            FileShare::None,
        )?;
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }
}
