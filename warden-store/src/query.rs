// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Read query operations for the user database.

use rusqlite::{Row, params};

use crate::connection::UserDb;
use crate::error::{Error, Result};
use crate::types::{GroupRecord, GroupWithMembers, UserRecord};

const USER_COLUMNS: &str = "uid, name, gid, gecos, dir, shell, brokerId, disabled, lastLogin";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        uid: row.get(0)?,
        name: row.get(1)?,
        gid: row.get(2)?,
        gecos: row.get(3)?,
        dir: row.get(4)?,
        shell: row.get(5)?,
        broker_id: row.get(6)?,
        disabled: row.get::<_, i64>(7)? != 0,
        last_login: row.get(8)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<GroupRecord> {
    Ok(GroupRecord {
        gid: row.get(0)?,
        name: row.get(1)?,
        ugid: row.get(2)?,
    })
}

impl UserDb {
    /// Look up a user by UID.
    pub fn user_by_id(&self, uid: u32) -> Result<UserRecord> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {USER_COLUMNS} FROM Users WHERE uid = ?1"))?;
        match stmt.query_row(params![uid], user_from_row) {
            Ok(user) => Ok(user),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::UserNotFound(uid.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a user by (lowercased) name.
    pub fn user_by_name(&self, name: &str) -> Result<UserRecord> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {USER_COLUMNS} FROM Users WHERE name = ?1"))?;
        match stmt.query_row(params![name], user_from_row) {
            Ok(user) => Ok(user),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::UserNotFound(name.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    /// All user rows, ordered by UID.
    pub fn all_users(&self) -> Result<Vec<UserRecord>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {USER_COLUMNS} FROM Users ORDER BY uid"))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Look up a group by GID.
    pub fn group_by_id(&self, gid: u32) -> Result<GroupRecord> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT gid, name, ugid FROM Groups WHERE gid = ?1")?;
        match stmt.query_row(params![gid], group_from_row) {
            Ok(group) => Ok(group),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::GroupNotFound(gid.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a group by (lowercased) name.
    pub fn group_by_name(&self, name: &str) -> Result<GroupRecord> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT gid, name, ugid FROM Groups WHERE name = ?1")?;
        match stmt.query_row(params![name], group_from_row) {
            Ok(group) => Ok(group),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::GroupNotFound(name.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    /// Look up a group by its broker-stable UGID.
    pub fn group_by_ugid(&self, ugid: &str) -> Result<GroupRecord> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT gid, name, ugid FROM Groups WHERE ugid = ?1")?;
        match stmt.query_row(params![ugid], group_from_row) {
            Ok(group) => Ok(group),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(Error::GroupNotFound(ugid.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    /// Member user names of a group, ordered by name.
    pub fn members_of(&self, gid: u32) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT u.name
            FROM Memberships m
            JOIN Users u ON m.uid = u.uid
            WHERE m.gid = ?1
            ORDER BY u.name
            "#,
        )?;
        let names = stmt
            .query_map(params![gid], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// A group together with its resolved member names.
    pub fn group_with_members(&self, gid: u32) -> Result<GroupWithMembers> {
        let group = self.group_by_id(gid)?;
        let users = self.members_of(gid)?;
        Ok(GroupWithMembers { group, users })
    }

    /// All groups with member names resolved, ordered by GID.
    ///
    /// A membership row pointing at a missing user or group is a
    /// structural violation and reported as corruption.
    pub fn all_groups_with_members(&self) -> Result<Vec<GroupWithMembers>> {
        let dangling: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*) FROM Memberships m
            WHERE NOT EXISTS (SELECT 1 FROM Users u WHERE u.uid = m.uid)
               OR NOT EXISTS (SELECT 1 FROM Groups g WHERE g.gid = m.gid)
            "#,
            [],
            |row| row.get(0),
        )?;
        if dangling > 0 {
            return Err(Error::Corrupt(format!(
                "{dangling} membership rows reference missing users or groups"
            )));
        }

        let mut stmt = self
            .conn
            .prepare_cached("SELECT gid, name, ugid FROM Groups ORDER BY gid")?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        groups
            .into_iter()
            .map(|group| {
                let users = self.members_of(group.gid)?;
                Ok(GroupWithMembers { group, users })
            })
            .collect()
    }

    /// Store-managed groups of a user, private group first.
    pub fn groups_of_user(&self, uid: u32) -> Result<Vec<GroupRecord>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT g.gid, g.name, g.ugid
            FROM Memberships m
            JOIN Groups g ON m.gid = g.gid
            WHERE m.uid = ?1
            ORDER BY (g.gid != ?1), g.gid
            "#,
        )?;
        let groups = stmt
            .query_map(params![uid], group_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(groups)
    }

    /// Local-only group names recorded for a user.
    pub fn local_groups_of_user(&self, uid: u32) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM LocalGroups WHERE uid = ?1 ORDER BY name")?;
        let names = stmt
            .query_map(params![uid], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// The broker that last authenticated `name`, or empty if never bound.
    pub fn broker_for_user(&self, name: &str) -> Result<String> {
        Ok(self.user_by_name(name)?.broker_id)
    }

    /// All UIDs and GIDs currently persisted, for the ID generator.
    pub fn used_ids(&self) -> Result<(Vec<u32>, Vec<u32>)> {
        let mut stmt = self.conn.prepare_cached("SELECT uid FROM Users")?;
        let uids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        let mut stmt = self.conn.prepare_cached("SELECT gid FROM Groups")?;
        let gids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<u32>>>()?;
        Ok((uids, gids))
    }
}
