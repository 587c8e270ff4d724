// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! NSS-facing entry shapes.
//!
//! These mirror the fields of `struct passwd`, `struct group` and
//! `struct spwd` that the NSS client side consumes. Password-age fields
//! of [`ShadowEntry`] always carry the sentinel `-1` ("unset"); warden
//! never stores credentials.

use serde::{Deserialize, Serialize};

/// A passwd-style user entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

/// A group-style entry with resolved member names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
    pub users: Vec<String>,
    pub passwd: String,
}

/// A shadow-style entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowEntry {
    pub name: String,
    pub last_pwd_change: i64,
    pub max_pwd_age: i64,
    pub pwd_warn_period: i64,
    pub pwd_inactivity: i64,
    pub min_pwd_age: i64,
    pub expiration_date: i64,
}

impl ShadowEntry {
    /// Build the entry for `name` with every age field unset.
    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_pwd_change: -1,
            max_pwd_age: -1,
            pwd_warn_period: -1,
            pwd_inactivity: -1,
            min_pwd_age: -1,
            expiration_date: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_sentinels() {
        let entry = ShadowEntry::unset("alice");
        assert_eq!(entry.name, "alice");
        assert_eq!(entry.last_pwd_change, -1);
        assert_eq!(entry.max_pwd_age, -1);
        assert_eq!(entry.pwd_warn_period, -1);
        assert_eq!(entry.pwd_inactivity, -1);
        assert_eq!(entry.min_pwd_age, -1);
        assert_eq!(entry.expiration_date, -1);
    }
}
