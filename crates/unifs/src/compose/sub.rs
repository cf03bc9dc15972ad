// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use super::{ComposedFileSystem, PathMapper};
use crate::fs::{ReadFileSystem, SharedFileSystem};
use crate::path::VfsPath;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./sub_test.rs"]
mod sub_test;

/// A view onto the subtree of another filesystem.
///
/// The sub filesystem's root corresponds to `sub_path` on the delegate;
/// every exposed path maps to `sub_path / path`. Events whose delegate
/// path falls outside the subtree are never forwarded.
pub type SubFileSystem = ComposedFileSystem<SubRoot>;

impl SubFileSystem {
    /// Root a new view at an existing directory of the delegate.
    pub fn new<P: Into<VfsPath>>(delegate: SharedFileSystem, sub_path: P) -> Result<Self> {
        let root = sub_path.into();
        root.check_absolute()?;
        if !delegate.directory_exists(&root)? {
            return Err(Error::NotFound(root));
        }
        Ok(ComposedFileSystem::with_mapper(delegate, SubRoot { root }))
    }

    /// The delegate directory this view is rooted at.
    pub fn sub_path(&self) -> &VfsPath {
        &self.mapper().root
    }
}

/// Maps a view's absolute paths under a fixed delegate directory.
#[derive(Debug)]
pub struct SubRoot {
    root: VfsPath,
}

impl SubRoot {
    pub fn new(root: VfsPath) -> Self {
        Self { root }
    }
}

impl PathMapper for SubRoot {
    fn to_delegate(&self, path: &VfsPath) -> VfsPath {
        self.root.join(path.to_relative())
    }

    fn from_delegate(&self, path: &VfsPath) -> Result<VfsPath> {
        if path == &self.root {
            return Ok(VfsPath::root());
        }
        if !path.is_in_directory(&self.root, true) {
            return Err(Error::InvariantViolation {
                path: path.clone(),
                root: self.root.clone(),
            });
        }
        if self.root.is_root() {
            return Ok(path.clone());
        }
        let stripped = &path.as_str()[self.root.as_str().len()..];
        Ok(VfsPath::from_canonical(stripped.to_string()))
    }
}
