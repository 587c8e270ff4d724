// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Parsers for the colon-separated passwd and group file formats.
//!
//! Only the OS files themselves are consulted, never other NSS sources;
//! warden is one of those sources and must not observe its own entries
//! while checking uniqueness.

use log::warn;

/// One line of the passwd file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub dir: String,
    pub shell: String,
}

/// One line of the group file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    pub name: String,
    pub gid: u32,
    pub members: Vec<String>,
}

/// Parse passwd-format content. Malformed lines are skipped with a warning.
pub(crate) fn parse_passwd(content: &str) -> Vec<LocalUser> {
    content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 7 {
                warn!("Skipping malformed passwd line: {line}");
                return None;
            }
            let (Ok(uid), Ok(gid)) = (fields[2].parse(), fields[3].parse()) else {
                warn!("Skipping passwd line with non-numeric ids: {line}");
                return None;
            };
            Some(LocalUser {
                name: fields[0].to_owned(),
                uid,
                gid,
                gecos: fields[4].to_owned(),
                dir: fields[5].to_owned(),
                shell: fields[6].to_owned(),
            })
        })
        .collect()
}

/// Parse group-format content. Malformed lines are skipped with a warning.
pub(crate) fn parse_group(content: &str) -> Vec<LocalGroup> {
    content
        .lines()
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 4 {
                warn!("Skipping malformed group line: {line}");
                return None;
            }
            let Ok(gid) = fields[2].parse() else {
                warn!("Skipping group line with non-numeric gid: {line}");
                return None;
            };
            let members = fields[3]
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_owned)
                .collect();
            Some(LocalGroup {
                name: fields[0].to_owned(),
                gid,
                members,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin
# a comment
broken line without colons
bob:x:1001:1001:Bob,,,:/home/bob:/bin/zsh
";

    const GROUP: &str = "\
root:x:0:
sudo:x:27:bob,carol
plugdev:x:46:
malformed:x:nonsense:members
";

    #[test]
    fn test_parse_passwd() {
        let users = parse_passwd(PASSWD);
        assert_eq!(users.len(), 3);
        assert_eq!(users[0].name, "root");
        assert_eq!(users[0].uid, 0);
        assert_eq!(users[2].name, "bob");
        assert_eq!(users[2].gid, 1001);
        assert_eq!(users[2].shell, "/bin/zsh");
    }

    #[test]
    fn test_parse_group() {
        let groups = parse_group(GROUP);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1].name, "sudo");
        assert_eq!(groups[1].gid, 27);
        assert_eq!(groups[1].members, vec!["bob", "carol"]);
        assert!(groups[2].members.is_empty());
    }

    #[test]
    fn test_empty_content() {
        assert!(parse_passwd("").is_empty());
        assert!(parse_group("").is_empty());
    }
}
