// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! The user descriptor handed over by brokers.
//!
//! Brokers return this shape (as JSON) when a session reports a grant.
//! IDs are optional: the identity manager assigns them on first sight and
//! keeps them stable afterwards.

use serde::{Deserialize, Serialize};

/// A group a user belongs to, as described by a broker.
///
/// An empty `ugid` marks a local group whose membership lives in the OS
/// group file rather than in warden's own store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(default)]
    pub ugid: String,
}

impl GroupInfo {
    /// Whether this group is kept in the OS group file only.
    pub fn is_local(&self) -> bool {
        self.ugid.is_empty()
    }
}

/// A full user descriptor as returned by a broker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default)]
    pub gecos: String,
    #[serde(default)]
    pub dir: String,
    #[serde(default)]
    pub shell: String,
    #[serde(default)]
    pub groups: Vec<GroupInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_descriptor_parses() {
        let info: UserInfo = serde_json::from_str(r#"{"name": "alice"}"#).unwrap();
        assert_eq!(info.name, "alice");
        assert_eq!(info.uid, None);
        assert!(info.groups.is_empty());
    }

    #[test]
    fn test_local_group_detection() {
        let info: UserInfo = serde_json::from_str(
            r#"{
                "name": "alice",
                "groups": [
                    {"name": "cloud-users", "ugid": "grp-1234"},
                    {"name": "sudo"}
                ]
            }"#,
        )
        .unwrap();
        assert!(!info.groups[0].is_local());
        assert!(info.groups[1].is_local());
    }

    #[test]
    fn test_ids_are_omitted_when_unset() {
        let info = UserInfo {
            name: "bob".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("uid"));
    }
}
