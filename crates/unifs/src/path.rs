// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::ops::Div;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./path_test.rs"]
mod path_test;

/// An immutable, normalized, forward-slash path.
///
/// A path is either absolute (leading `/`), relative, or empty. The
/// backing string is always canonical: backslashes become `/`, runs of
/// separators collapse, `.` and `..` segments are resolved (`..` at the
/// absolute root stays at the root), and there is no trailing separator
/// except for the root itself. Two paths are equal exactly when their
/// canonical strings are equal.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VfsPath {
    full: String,
}

impl VfsPath {
    /// Build a path from an arbitrary string, canonicalizing it.
    pub fn new<S: AsRef<str>>(path: S) -> Self {
        Self {
            full: canonicalize(path.as_ref()),
        }
    }

    /// Build a path from a string that is already known to be canonical.
    ///
    /// Callers must guarantee canonicality; this is checked in debug
    /// builds only.
    pub(crate) fn from_canonical(full: String) -> Self {
        debug_assert_eq!(canonicalize(&full), full, "path must be canonical");
        Self { full }
    }

    /// The absolute root path, `/`.
    pub fn root() -> Self {
        Self { full: "/".into() }
    }

    pub fn as_str(&self) -> &str {
        &self.full
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    pub fn is_absolute(&self) -> bool {
        self.full.starts_with('/')
    }

    pub fn is_relative(&self) -> bool {
        !self.is_absolute()
    }

    pub fn is_root(&self) -> bool {
        self.full == "/"
    }

    /// Fail with an invalid path error unless this path is absolute.
    pub fn check_absolute(&self) -> Result<&Self> {
        if self.is_absolute() {
            Ok(self)
        } else {
            Err(Error::invalid_path(
                &self.full,
                "an absolute path is required",
            ))
        }
    }

    /// Join another path onto this one.
    ///
    /// An absolute `other` is returned unchanged, and joining onto an
    /// empty path yields `other` as well.
    pub fn join<S: AsRef<str>>(&self, other: S) -> Self {
        let other = other.as_ref();
        if other.starts_with('/') || other.starts_with('\\') {
            return Self::new(other);
        }
        if self.full.is_empty() {
            return Self::new(other);
        }
        if other.is_empty() {
            return self.clone();
        }
        Self::new(format!("{}/{}", self.full, other))
    }

    /// The directory portion of this path.
    ///
    /// `/a/b` yields `/a`, `/a` yields `/`, `a/b` yields `a`, and the
    /// root or a single relative name yield the empty path.
    pub fn parent(&self) -> Self {
        if self.is_root() || self.full.is_empty() {
            return Self::default();
        }
        match self.full.rfind('/') {
            None => Self::default(),
            Some(0) => Self::root(),
            Some(idx) => Self {
                full: self.full[..idx].to_string(),
            },
        }
    }

    /// The final name segment, or an empty string for the root or the
    /// empty path.
    pub fn file_name(&self) -> &str {
        if self.is_root() {
            return "";
        }
        match self.full.rfind('/') {
            None => &self.full,
            Some(idx) => &self.full[idx + 1..],
        }
    }

    /// The final name segment without its extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            None | Some(0) => name,
            Some(idx) => &name[..idx],
        }
    }

    /// The extension of the final name segment, including the leading
    /// dot, or None when there is no extension.
    pub fn extension_with_dot(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            None | Some(0) => None,
            Some(idx) => Some(&name[idx..]),
        }
    }

    /// True if this path is `directory` or lives under it.
    ///
    /// When `recursive` is false only the directory itself and its
    /// direct children qualify.
    pub fn is_in_directory(&self, directory: &VfsPath, recursive: bool) -> bool {
        if self == directory {
            return true;
        }
        let dir = directory.full.as_str();
        if dir.is_empty() {
            return false;
        }
        let rest = match self.full.strip_prefix(dir) {
            Some(rest) => rest,
            None => return false,
        };
        // a prefix match must end on a segment boundary
        let rest = if dir.ends_with('/') {
            rest
        } else {
            match rest.strip_prefix('/') {
                Some(rest) => rest,
                None => return false,
            }
        };
        if rest.is_empty() {
            return false;
        }
        recursive || !rest.contains('/')
    }

    /// This path without its leading separator.
    pub fn to_relative(&self) -> Self {
        match self.full.strip_prefix('/') {
            Some(rest) => Self {
                full: rest.to_string(),
            },
            None => self.clone(),
        }
    }

    /// The name segments of this path, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.full.split('/').filter(|s| !s.is_empty())
    }
}

/// Canonicalize an arbitrary path string.
fn canonicalize(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    let absolute = normalized.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match segments.last() {
                Some(&"..") | None => {
                    // `..` at the absolute root resolves to the root
                    if !absolute {
                        segments.push("..");
                    }
                }
                Some(_) => {
                    segments.pop();
                }
            },
            segment => segments.push(segment),
        }
    }
    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{joined}"),
        (false, _) => joined,
    }
}

impl std::fmt::Display for VfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

impl std::fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.full)
    }
}

impl From<&str> for VfsPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for VfsPath {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

impl From<&VfsPath> for VfsPath {
    fn from(path: &VfsPath) -> Self {
        path.clone()
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.full
    }
}

impl Div<&str> for &VfsPath {
    type Output = VfsPath;

    fn div(self, rhs: &str) -> Self::Output {
        self.join(rhs)
    }
}

impl Div<&VfsPath> for &VfsPath {
    type Output = VfsPath;

    fn div(self, rhs: &VfsPath) -> Self::Output {
        self.join(rhs)
    }
}
