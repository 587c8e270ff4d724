// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Error types for local-entry operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for local-entry operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or editing the OS user database.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error with the file it happened on
    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// flock() on the user-database lock file failed
    #[error("Failed to lock user database via '{path}': {errno}")]
    Lock { path: PathBuf, errno: nix::Error },

    /// The group editor could not be spawned
    #[error("Failed to run group editor '{program}': {source}")]
    EditorSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The group editor exited with an unexpected status
    #[error("Group editor failed for group '{group}' (status {status}): {stderr}")]
    EditorFailed {
        group: String,
        status: i32,
        stderr: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
