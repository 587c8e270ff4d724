// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Error types for store operations.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error that is neither a conflict nor corruption
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to prepare the database file or its flag file
    #[error("Failed to prepare database at '{path}': {source}")]
    DatabaseSetup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// User not present in the store
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// Group not present in the store
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// A different row already owns the requested name or ID
    #[error("conflicting entry: {0}")]
    Conflict(String),

    /// The database violates its own structure and must be rebuilt
    #[error("store is corrupt: {0}")]
    Corrupt(String),
}

impl Error {
    /// Whether this error means "no such row" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::UserNotFound(_) | Error::GroupNotFound(_))
    }

    /// Whether the store should be flagged for a clear-and-rebuild.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _) => match code.code {
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    Error::Corrupt(err.to_string())
                }
                // Foreign-key violations mean a dangling membership or
                // similar structural breakage, not a caller mistake.
                ErrorCode::ConstraintViolation
                    if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                {
                    Error::Corrupt(err.to_string())
                }
                ErrorCode::ConstraintViolation => Error::Conflict(err.to_string()),
                _ => Error::Sqlite(err),
            },
            _ => Error::Sqlite(err),
        }
    }
}
