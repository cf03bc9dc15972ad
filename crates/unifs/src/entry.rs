// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::io::{Read, Write};
use std::sync::Arc;

use crate::fs::{
    FileAccess,
    FileAttributes,
    FileShare,
    FileSystem,
    OpenMode,
    ReadFileSystem,
    SearchTarget,
    SharedFileSystem,
    VfsFile,
};
use crate::path::VfsPath;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./entry_test.rs"]
mod entry_test;

/// Copy a file from one backend to another.
///
/// Falls back to the source backend's own copy when both handles refer
/// to the same backend. The destination's write time is aligned with
/// the source on a best-effort basis.
pub fn copy_file_between(
    src_fs: &dyn FileSystem,
    src: &VfsPath,
    dest_fs: &dyn FileSystem,
    dest: &VfsPath,
    overwrite: bool,
) -> Result<()> {
    if src_fs.identity() == dest_fs.identity() {
        return src_fs.copy_file(src, dest, overwrite);
    }
    if !overwrite && dest_fs.file_exists(dest)? {
        return Err(Error::DestinationExists(dest.clone()));
    }
    let mut reader = src_fs.open_read(src)?;
    let mut writer = dest_fs.open_file(
        dest,
        OpenMode::Create,
        FileAccess::Write,
        FileShare::None,
    )?;
    let mut buffer = [0u8; 8192];
    loop {
        let count = reader.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        writer.write_all(&buffer[..count])?;
    }
    writer.flush()?;
    drop(writer);
    if let Ok(written) = src_fs.last_write_time(src) {
        if let Err(err) = dest_fs.set_last_write_time(dest, written) {
            tracing::debug!(?err, %dest, "could not preserve the source write time");
        }
    }
    Ok(())
}

/// A lightweight handle to one file of a backend.
///
/// Holds a shared, non-exclusive reference to the backend; dropping an
/// entry never affects the backend itself.
#[derive(Clone)]
pub struct FileEntry {
    fs: SharedFileSystem,
    path: VfsPath,
}

impl FileEntry {
    pub fn new(fs: SharedFileSystem, path: impl Into<VfsPath>) -> Result<Self> {
        let path = path.into();
        path.check_absolute()?;
        Ok(Self { fs, path })
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    pub fn filesystem(&self) -> &SharedFileSystem {
        &self.fs
    }

    pub fn exists(&self) -> Result<bool> {
        self.fs.file_exists(&self.path)
    }

    pub fn length(&self) -> Result<u64> {
        self.fs.file_length(&self.path)
    }

    pub fn attributes(&self) -> Result<FileAttributes> {
        self.fs.attributes(&self.path)
    }

    pub fn open_read(&self) -> Result<Box<dyn VfsFile>> {
        self.fs.open_read(&self.path)
    }

    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        self.fs.read_to_vec(&self.path)
    }

    pub fn write_all(&self, data: &[u8]) -> Result<()> {
        self.fs.write_all(&self.path, data)
    }

    pub fn delete(&self) -> Result<()> {
        self.fs.delete_file(&self.path)
    }

    /// The directory containing this file.
    pub fn parent(&self) -> DirectoryEntry {
        DirectoryEntry {
            fs: Arc::clone(&self.fs),
            path: self.path.parent(),
        }
    }
}

impl std::fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileEntry({:?})", self.path)
    }
}

/// A lightweight handle to one directory of a backend.
#[derive(Clone)]
pub struct DirectoryEntry {
    fs: SharedFileSystem,
    path: VfsPath,
}

impl DirectoryEntry {
    pub fn new(fs: SharedFileSystem, path: impl Into<VfsPath>) -> Result<Self> {
        let path = path.into();
        path.check_absolute()?;
        Ok(Self { fs, path })
    }

    pub fn path(&self) -> &VfsPath {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    pub fn filesystem(&self) -> &SharedFileSystem {
        &self.fs
    }

    pub fn exists(&self) -> Result<bool> {
        self.fs.directory_exists(&self.path)
    }

    pub fn create(&self) -> Result<()> {
        self.fs.create_directory(&self.path)
    }

    pub fn delete(&self, recursive: bool) -> Result<()> {
        self.fs.delete_directory(&self.path, recursive)
    }

    /// The files directly inside this directory matching `filter`.
    pub fn files(&self, filter: &str) -> Result<Vec<FileEntry>> {
        let entries = self
            .fs
            .enumerate(&self.path, filter, false, SearchTarget::File)?;
        entries
            .map(|entry| {
                entry.map(|path| FileEntry {
                    fs: Arc::clone(&self.fs),
                    path,
                })
            })
            .collect()
    }

    /// The directories directly inside this directory.
    pub fn directories(&self) -> Result<Vec<DirectoryEntry>> {
        let entries =
            self.fs
                .enumerate(&self.path, "*", false, SearchTarget::Directory)?;
        entries
            .map(|entry| {
                entry.map(|path| DirectoryEntry {
                    fs: Arc::clone(&self.fs),
                    path,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DirectoryEntry({:?})", self.path)
    }
}
