// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Error types for broker operations.

use thiserror::Error;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during broker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No broker registered under this id
    #[error("no broker with id '{0}'")]
    UnknownBroker(String),

    /// The session id does not match any live session
    #[error("no session with id '{0}'")]
    SessionUnknown(String),

    /// The selected mode is not part of the session's offered set
    #[error("unknown authentication mode '{0}'")]
    UnknownMode(String),

    /// The client-supplied authentication data is not valid JSON
    #[error("invalid authentication data: {0}")]
    InvalidAuthData(String),

    /// Another is_authenticated call for this session is in flight
    #[error("authentication already in progress for session '{0}'")]
    Busy(String),

    /// The broker does not know this user
    #[error("user '{0}' is not known to this broker")]
    UserNotFound(String),

    /// The local broker marks host-managed accounts and has no sessions
    #[error("the local broker does not support session operations")]
    LocalBroker,
}
