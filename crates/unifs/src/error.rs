// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::io;

use thiserror::Error;

use crate::path::VfsPath;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    String(String),
    #[error(transparent)]
    IO(#[from] io::Error),

    #[error("path not found: {0}")]
    NotFound(VfsPath),
    #[error("path already exists: {0}")]
    AlreadyExists(VfsPath),
    #[error("destination already exists: {0}")]
    DestinationExists(VfsPath),
    #[error("path is a directory: {0}")]
    IsDirectory(VfsPath),
    #[error("path is not a directory: {0}")]
    NotADirectory(VfsPath),
    #[error("directory is not empty: {0}")]
    DirectoryNotEmpty(VfsPath),
    #[error("access denied: {0}")]
    AccessDenied(VfsPath),
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("invalid filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
    #[error("delegate filesystem produced '{path}', which is outside of '{root}'")]
    InvariantViolation { path: VfsPath, root: VfsPath },
    #[error("{0} has been disposed")]
    Disposed(&'static str),
}

impl Error {
    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Error {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_filter<F: Into<String>, R: Into<String>>(filter: F, reason: R) -> Error {
        Error::InvalidFilter {
            filter: filter.into(),
            reason: reason.into(),
        }
    }

    /// Map a native io error into the canonical taxonomy for `path`.
    pub fn from_io(err: io::Error, path: &VfsPath) -> Error {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.clone()),
            io::ErrorKind::PermissionDenied => Error::AccessDenied(path.clone()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.clone()),
            _ => Error::IO(err),
        }
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::String(err)
    }
}

impl From<&str> for Error {
    fn from(err: &str) -> Self {
        Error::String(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        let msg = err.to_string();
        match err.into_io_error() {
            Some(err) => err.into(),
            None => Self::String(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
