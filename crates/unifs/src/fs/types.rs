// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;

#[cfg(test)]
#[path = "./types_test.rs"]
mod types_test;

/// How a file is opened or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file, failing if it already exists
    CreateNew,
    /// Create the file, truncating it if it already exists
    Create,
    /// Open an existing file
    Open,
    /// Open the file, creating it if missing
    OpenOrCreate,
    /// Open an existing file and empty it
    Truncate,
    /// Open or create the file and position writes at its end
    Append,
}

impl OpenMode {
    /// True for modes that always create or destroy content and
    /// therefore require write access.
    pub fn requires_write(&self) -> bool {
        matches!(
            self,
            OpenMode::CreateNew | OpenMode::Create | OpenMode::Truncate | OpenMode::Append
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    Read,
    Write,
    ReadWrite,
}

impl FileAccess {
    pub fn can_read(&self) -> bool {
        matches!(self, FileAccess::Read | FileAccess::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, FileAccess::Write | FileAccess::ReadWrite)
    }
}

/// Concurrent access granted to other openers of the same file.
///
/// Backends that cannot enforce sharing are free to ignore this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileShare {
    None,
    Read,
    Write,
    ReadWrite,
    Delete,
}

/// The kind of entries produced by an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTarget {
    File,
    Directory,
    Both,
}

impl SearchTarget {
    pub fn wants_files(&self) -> bool {
        matches!(self, SearchTarget::File | SearchTarget::Both)
    }

    pub fn wants_directories(&self) -> bool {
        matches!(self, SearchTarget::Directory | SearchTarget::Both)
    }
}

/// File attribute bits.
///
/// Backends store the bits they understand and silently ignore the
/// rest; unsupported bits must never cause a failure.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FileAttributes(u32);

impl FileAttributes {
    pub const READ_ONLY: FileAttributes = FileAttributes(0x0001);
    pub const HIDDEN: FileAttributes = FileAttributes(0x0002);
    pub const SYSTEM: FileAttributes = FileAttributes(0x0004);
    pub const DIRECTORY: FileAttributes = FileAttributes(0x0010);
    pub const ARCHIVE: FileAttributes = FileAttributes(0x0020);
    pub const DEVICE: FileAttributes = FileAttributes(0x0040);
    pub const NORMAL: FileAttributes = FileAttributes(0x0080);
    pub const TEMPORARY: FileAttributes = FileAttributes(0x0100);
    pub const SPARSE_FILE: FileAttributes = FileAttributes(0x0200);
    pub const REPARSE_POINT: FileAttributes = FileAttributes(0x0400);
    pub const COMPRESSED: FileAttributes = FileAttributes(0x0800);
    pub const OFFLINE: FileAttributes = FileAttributes(0x1000);
    pub const NOT_CONTENT_INDEXED: FileAttributes = FileAttributes(0x2000);
    pub const ENCRYPTED: FileAttributes = FileAttributes(0x4000);

    pub fn empty() -> FileAttributes {
        FileAttributes(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: FileAttributes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for FileAttributes {
    type Output = FileAttributes;

    fn bitor(self, rhs: Self) -> Self::Output {
        FileAttributes(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FileAttributes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::ops::BitAnd for FileAttributes {
    type Output = FileAttributes;

    fn bitand(self, rhs: Self) -> Self::Output {
        FileAttributes(self.0 & rhs.0)
    }
}

impl std::fmt::Debug for FileAttributes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FileAttributes({:#06x})", self.0)
    }
}

/// The timestamp reported for paths that do not exist or whose backend
/// does not record the requested time.
pub fn default_file_time() -> DateTime<Utc> {
    static SENTINEL: Lazy<DateTime<Utc>> = Lazy::new(|| {
        Utc.with_ymd_and_hms(1601, 1, 1, 0, 0, 0)
            .single()
            .expect("the sentinel timestamp is a valid date")
    });
    *SENTINEL
}
