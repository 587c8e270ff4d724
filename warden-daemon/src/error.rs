// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

use thiserror::Error;
use warden_types::ErrorCode;

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("Store error: {0}")]
    Store(#[from] warden_store::Error),

    #[error("Local entries error: {0}")]
    Local(#[from] warden_local::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] warden_broker::Error),

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("no free ids left in range [{min}, {max}]")]
    ExhaustedRange { min: u32, max: u32 },

    #[error("Permission denied: this operation requires the privileged uid")]
    PermissionDenied,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DaemonError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Whether the underlying cause is a missing user/group/session.
    pub fn is_not_found(&self) -> bool {
        match self {
            DaemonError::Store(e) => e.is_not_found(),
            DaemonError::Broker(e) => matches!(
                e,
                warden_broker::Error::UserNotFound(_)
                    | warden_broker::Error::SessionUnknown(_)
                    | warden_broker::Error::UnknownBroker(_)
            ),
            _ => false,
        }
    }

    /// The wire-level status code this error maps to.
    pub fn code(&self) -> ErrorCode {
        match self {
            DaemonError::Store(e) if e.is_not_found() => ErrorCode::NotFound,
            DaemonError::Store(warden_store::Error::Conflict(_)) => ErrorCode::InvalidArgument,
            DaemonError::Store(_) => ErrorCode::Internal,
            DaemonError::Broker(e) => match e {
                warden_broker::Error::UnknownBroker(_)
                | warden_broker::Error::SessionUnknown(_)
                | warden_broker::Error::UserNotFound(_) => ErrorCode::NotFound,
                warden_broker::Error::UnknownMode(_)
                | warden_broker::Error::InvalidAuthData(_)
                | warden_broker::Error::LocalBroker => ErrorCode::InvalidArgument,
                warden_broker::Error::Busy(_) => ErrorCode::Aborted,
            },
            DaemonError::InvalidInput(_) | DaemonError::Conflict(_) => ErrorCode::InvalidArgument,
            DaemonError::ExhaustedRange { .. } => ErrorCode::ResourceExhausted,
            DaemonError::PermissionDenied => ErrorCode::PermissionDenied,
            DaemonError::Local(_)
            | DaemonError::Io { .. }
            | DaemonError::Config(_)
            | DaemonError::Toml(_)
            | DaemonError::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Helper trait for adding context to IO errors
pub trait IoContext<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DaemonError::io(f(), e))
    }
}
