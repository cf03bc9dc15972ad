// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

//! A uniform filesystem abstraction with layered composition.
//!
//! Files and directories are manipulated through one protocol
//! regardless of where they live: on native disk, in memory, inside a
//! tar archive, or behind a composed view. Backends stack: a subtree of
//! one filesystem can be mounted as the root of another, several
//! backends can be unioned together, and any backend can be exposed
//! read-only. Composed filesystems stay watchable: change events flow
//! up through the wrappers with their paths translated, delivered
//! asynchronously on a dispatcher thread per producing backend.
//!
//! ```
//! use unifs::backend::MemoryFileSystem;
//! use unifs::compose::SubFileSystem;
//! use unifs::{FileSystem, ReadFileSystem, SharedFileSystem, VfsPath};
//!
//! # fn main() -> unifs::Result<()> {
//! let fs: SharedFileSystem = std::sync::Arc::new(MemoryFileSystem::new());
//! fs.create_directory(&VfsPath::new("/a/b"))?;
//! fs.write_all(&VfsPath::new("/a/b/c.txt"), b"hello")?;
//!
//! let sub = SubFileSystem::new(fs, "/a")?;
//! assert_eq!(sub.read_to_vec(&VfsPath::new("/b/c.txt"))?, b"hello");
//! # Ok(())
//! # }
//! ```

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
#[macro_use]
pub mod fixtures;

pub mod backend;
pub mod compose;
mod entry;
mod error;
mod filter;
pub mod fs;
mod path;
pub mod watch;

pub use entry::{copy_file_between, DirectoryEntry, FileEntry};
pub use error::{Error, Result};
pub use filter::SearchPattern;
pub use fs::{
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
pub use path::VfsPath;
