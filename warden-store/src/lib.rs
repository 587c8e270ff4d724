// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! SQLite persistence for warden-managed users and groups.
//!
//! The store is the single source of truth for every identity the daemon
//! has materialized: user rows, broker group rows, memberships, the
//! local-group lists and the per-user broker binding. All mutations run
//! in one SQLite transaction; readers observe the last committed state.
//!
//! # Corruption protocol
//!
//! A sibling flag file (`warden.db.dirty`) marks the database as corrupt.
//! When [`UserDb::open`] finds the flag it discards the database, rebuilds
//! the schema and removes the flag. Callers that hit a structural error
//! mark the flag via [`UserDb::mark_dirty`] and signal their rebuild
//! channel.

mod connection;
mod error;
mod query;
mod schema;
mod types;
mod write;

pub use connection::UserDb;
pub use error::{Error, Result};
pub use types::{GroupRecord, GroupWithMembers, UserRecord};
