// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Row types for warden identities.

use serde::{Deserialize, Serialize};
use warden_types::{GroupEntry, UserEntry};

/// A user row as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Lowercased login name, unique across the store
    pub name: String,
    /// Allocated UID, immutable for the lifetime of the row
    pub uid: u32,
    /// GID of the user's private group; always equals `uid`
    pub gid: u32,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
    /// ID of the broker that last authenticated this user, or empty
    pub broker_id: String,
    /// Disabled users are refused new authentication sessions
    pub disabled: bool,
    /// Unix timestamp of the last successful authentication
    pub last_login: i64,
}

impl UserRecord {
    /// The passwd-style view of this row.
    pub fn to_entry(&self) -> UserEntry {
        UserEntry {
            name: self.name.clone(),
            uid: self.uid,
            gid: self.gid,
            gecos: self.gecos.clone(),
            dir: self.dir.clone(),
            shell: self.shell.clone(),
        }
    }
}

/// A group row as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Lowercased group name, unique across the store
    pub name: String,
    /// Allocated GID
    pub gid: u32,
    /// Broker-stable opaque identifier; detects renames. For a user's
    /// private group this equals the user name.
    pub ugid: String,
}

impl GroupRecord {
    /// The private group implicitly coupled to a user row.
    pub fn private_for(user: &UserRecord) -> Self {
        Self {
            name: user.name.clone(),
            gid: user.uid,
            ugid: user.name.clone(),
        }
    }
}

/// A group row together with its resolved member names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWithMembers {
    pub group: GroupRecord,
    pub users: Vec<String>,
}

impl GroupWithMembers {
    /// The NSS-facing view of this group.
    pub fn to_entry(&self) -> GroupEntry {
        GroupEntry {
            name: self.group.name.clone(),
            gid: self.group.gid,
            users: self.users.clone(),
            passwd: "x".to_string(),
        }
    }
}
