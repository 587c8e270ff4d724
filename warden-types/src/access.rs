// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Access decisions returned by broker authentication.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of one `is_authenticated` evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Authentication succeeded and no further step is required.
    Granted,
    /// Authentication failed definitively for this session.
    Denied,
    /// The supplied data was wrong but the client may try again.
    Retry,
    /// This step succeeded but another authentication factor is required.
    Next,
    /// The in-flight call was cancelled by the client.
    Cancelled,
}

impl Access {
    /// Stable string form used on the wire and in broker responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Granted => "granted",
            Access::Denied => "denied",
            Access::Retry => "retry",
            Access::Next => "next",
            Access::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
