// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::sync::Arc;

use crate::fs::SharedFileSystem;
use crate::path::VfsPath;
use crate::Error;

/// The kind of change reported by a watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Deleted,
    Changed,
    Renamed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Deleted => f.write_str("deleted"),
            Self::Changed => f.write_str("changed"),
            Self::Renamed => f.write_str("renamed"),
        }
    }
}

/// A file or directory was created, deleted or modified.
#[derive(Clone)]
pub struct ChangeEvent {
    /// The filesystem that produced this event
    pub fs: SharedFileSystem,
    pub kind: ChangeKind,
    /// The absolute path of the affected entry
    pub path: VfsPath,
}

impl ChangeEvent {
    /// The final name segment of the affected entry.
    pub fn name(&self) -> &str {
        self.path.file_name()
    }
}

impl std::fmt::Debug for ChangeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .finish()
    }
}

/// A file or directory was moved to a new path.
#[derive(Clone)]
pub struct RenameEvent {
    pub fs: SharedFileSystem,
    /// The path after the move
    pub path: VfsPath,
    /// The path before the move
    pub old_path: VfsPath,
}

impl RenameEvent {
    pub fn name(&self) -> &str {
        self.path.file_name()
    }

    pub fn old_name(&self) -> &str {
        self.old_path.file_name()
    }
}

impl std::fmt::Debug for RenameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenameEvent")
            .field("path", &self.path)
            .field("old_path", &self.old_path)
            .finish()
    }
}

/// A failure raised on a watcher's error stream.
///
/// Carries the error and, when known, the path involved.
#[derive(Debug, Clone)]
pub struct WatchErrorEvent {
    pub error: Arc<Error>,
    pub path: Option<VfsPath>,
}

/// Selects the kinds of changes a watcher reports.
///
/// Carried as watcher configuration and propagated to wrapped and
/// aggregated watchers; leaf backends consult the bits they support.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifyFilters(u32);

impl NotifyFilters {
    pub const FILE_NAME: NotifyFilters = NotifyFilters(0x001);
    pub const DIRECTORY_NAME: NotifyFilters = NotifyFilters(0x002);
    pub const ATTRIBUTES: NotifyFilters = NotifyFilters(0x004);
    pub const SIZE: NotifyFilters = NotifyFilters(0x008);
    pub const LAST_WRITE: NotifyFilters = NotifyFilters(0x010);
    pub const LAST_ACCESS: NotifyFilters = NotifyFilters(0x020);
    pub const CREATION_TIME: NotifyFilters = NotifyFilters(0x040);
    pub const SECURITY: NotifyFilters = NotifyFilters(0x100);

    pub fn empty() -> NotifyFilters {
        NotifyFilters(0)
    }

    pub fn contains(&self, other: NotifyFilters) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for NotifyFilters {
    fn default() -> Self {
        Self::LAST_WRITE | Self::FILE_NAME | Self::DIRECTORY_NAME
    }
}

impl std::ops::BitOr for NotifyFilters {
    type Output = NotifyFilters;

    fn bitor(self, rhs: Self) -> Self::Output {
        NotifyFilters(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for NotifyFilters {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Debug for NotifyFilters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotifyFilters({:#05x})", self.0)
    }
}
