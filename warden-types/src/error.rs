// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Wire-level error codes.
//!
//! Every error raised inside the daemon maps onto one of these codes
//! before it reaches a client. The mapping is part of the RPC contract;
//! the NSS client additionally folds `NotFound` into its own NOTFOUND
//! status.

use serde::{Deserialize, Serialize};

/// RPC status codes surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The requested user, group, session or broker does not exist.
    NotFound,
    /// The request is structurally valid but conflicts with or is rejected
    /// by current state (bad name, unknown mode, malformed auth data).
    InvalidArgument,
    /// Another call on the same session is in flight; retry later.
    Aborted,
    /// The configured ID range has no free IDs left.
    ResourceExhausted,
    /// The peer is not allowed to perform this operation.
    PermissionDenied,
    /// Anything the daemon cannot attribute to the caller.
    Internal,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::not_found(ErrorCode::NotFound, "\"not_found\"")]
    #[case::invalid_argument(ErrorCode::InvalidArgument, "\"invalid_argument\"")]
    #[case::aborted(ErrorCode::Aborted, "\"aborted\"")]
    #[case::resource_exhausted(ErrorCode::ResourceExhausted, "\"resource_exhausted\"")]
    #[case::permission_denied(ErrorCode::PermissionDenied, "\"permission_denied\"")]
    #[case::internal(ErrorCode::Internal, "\"internal\"")]
    fn wire_form(#[case] code: ErrorCode, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&code).unwrap(), expected);
    }
}
