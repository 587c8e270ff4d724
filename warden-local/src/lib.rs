// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Locked read access to the OS passwd/group files and membership edits.
//!
//! The daemon must never hand out a UID, GID or name that the host
//! already uses, and it must not race other processes that edit the user
//! database. [`LocalEntries::lock`] therefore takes both an in-process
//! mutex and a cross-process `flock()` before any local entry is read or
//! the group editor runs. The lock is released when the returned
//! [`LockedEntries`] is dropped.

mod editor;
mod entries;
mod error;
mod lock;

pub use editor::GroupEditor;
pub use entries::{LocalGroup, LocalUser};
pub use error::{Error, Result};
pub use lock::{LocalEntries, LockedEntries};
