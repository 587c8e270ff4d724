// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Write operations for the user database.
//!
//! Every mutation commits in a single transaction so a crash exposes
//! either the pre-state or the post-state, never a partial write.

use std::collections::HashSet;

use log::info;
use rusqlite::{Transaction, params};

use crate::connection::UserDb;
use crate::error::{Error, Result};
use crate::types::{GroupRecord, UserRecord};

impl UserDb {
    /// Insert or update a user with its full group set.
    ///
    /// Atomically writes the user row, inserts or renames the supplied
    /// groups, reconciles memberships to exactly `groups`, deletes groups
    /// the user left that became empty and records `local_groups`.
    ///
    /// Fails with [`Error::Conflict`] when a different user already owns
    /// the name or the UID.
    pub fn upsert_user(
        &mut self,
        user: &UserRecord,
        groups: &[GroupRecord],
        local_groups: &[String],
    ) -> Result<()> {
        let tx = self.conn.transaction()?;

        let clash: Option<(u32, String)> = tx
            .query_row(
                "SELECT uid, name FROM Users WHERE (name = ?1 AND uid != ?2) OR (uid = ?2 AND name != ?1)",
                params![user.name, user.uid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })?;
        if let Some((uid, name)) = clash {
            return Err(Error::Conflict(format!(
                "user '{name}' (uid {uid}) already holds the requested name or uid"
            )));
        }

        tx.execute(
            r#"
            INSERT INTO Users (uid, name, gid, gecos, dir, shell, brokerId, disabled, lastLogin)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(uid) DO UPDATE SET
                name = excluded.name,
                gid = excluded.gid,
                gecos = excluded.gecos,
                dir = excluded.dir,
                shell = excluded.shell,
                brokerId = excluded.brokerId,
                disabled = excluded.disabled,
                lastLogin = excluded.lastLogin
            "#,
            params![
                user.uid,
                user.name,
                user.gid,
                user.gecos,
                user.dir,
                user.shell,
                user.broker_id,
                user.disabled as i64,
                user.last_login,
            ],
        )?;

        for group in groups {
            tx.execute(
                r#"
                INSERT INTO Groups (gid, name, ugid)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(gid) DO UPDATE SET
                    name = excluded.name,
                    ugid = excluded.ugid
                "#,
                params![group.gid, group.name, group.ugid],
            )?;
        }

        let old_gids = gids_of(&tx, user.uid)?;
        let new_gids: HashSet<u32> = groups.iter().map(|g| g.gid).collect();

        tx.execute("DELETE FROM Memberships WHERE uid = ?1", params![user.uid])?;
        for gid in &new_gids {
            tx.execute(
                "INSERT INTO Memberships (uid, gid) VALUES (?1, ?2)",
                params![user.uid, gid],
            )?;
        }
        drop_empty_groups(&tx, old_gids.iter().filter(|g| !new_gids.contains(*g)))?;

        tx.execute("DELETE FROM LocalGroups WHERE uid = ?1", params![user.uid])?;
        for name in local_groups {
            tx.execute(
                "INSERT OR IGNORE INTO LocalGroups (uid, name) VALUES (?1, ?2)",
                params![user.uid, name],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a user, its private group and its memberships.
    ///
    /// Groups that lose their last member are removed as well.
    pub fn delete_user(&mut self, uid: u32) -> Result<()> {
        let tx = self.conn.transaction()?;
        Self::delete_user_tx(&tx, uid)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_user_tx(tx: &Transaction<'_>, uid: u32) -> Result<()> {
        let gids = gids_of(tx, uid)?;

        let removed = tx.execute("DELETE FROM Users WHERE uid = ?1", params![uid])?;
        if removed == 0 {
            return Err(Error::UserNotFound(uid.to_string()));
        }

        // The private group shares the user's UID and dies with it.
        tx.execute("DELETE FROM Groups WHERE gid = ?1", params![uid])?;
        drop_empty_groups(tx, gids.iter().filter(|g| **g != uid))?;
        Ok(())
    }

    /// Record which broker last authenticated this user.
    pub fn set_broker_for_user(&self, uid: u32, broker_id: &str) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE Users SET brokerId = ?2 WHERE uid = ?1",
            params![uid, broker_id],
        )?;
        if updated == 0 {
            return Err(Error::UserNotFound(uid.to_string()));
        }
        Ok(())
    }

    /// Flip the disabled flag of a user.
    pub fn set_user_disabled(&self, name: &str, disabled: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE Users SET disabled = ?2 WHERE name = ?1",
            params![name, disabled as i64],
        )?;
        if updated == 0 {
            return Err(Error::UserNotFound(name.to_owned()));
        }
        Ok(())
    }

    /// Stamp the last successful authentication of a user.
    pub fn set_last_login(&self, name: &str, timestamp: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE Users SET lastLogin = ?2 WHERE name = ?1",
            params![name, timestamp],
        )?;
        if updated == 0 {
            return Err(Error::UserNotFound(name.to_owned()));
        }
        Ok(())
    }

    /// Delete users whose last login predates `cutoff` and who are not in
    /// `active`. Returns the evicted user names.
    pub fn clean_expired_users(
        &mut self,
        active: &HashSet<String>,
        cutoff: i64,
    ) -> Result<Vec<String>> {
        let tx = self.conn.transaction()?;

        let expired: Vec<(u32, String)> = {
            let mut stmt =
                tx.prepare("SELECT uid, name FROM Users WHERE lastLogin < ?1 ORDER BY uid")?;
            stmt.query_map(params![cutoff], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut cleaned = Vec::new();
        for (uid, name) in expired {
            if active.contains(&name) {
                continue;
            }
            Self::delete_user_tx(&tx, uid)?;
            info!("Expired user {name} (uid {uid}) removed from the store");
            cleaned.push(name);
        }

        tx.commit()?;
        Ok(cleaned)
    }
}

fn gids_of(tx: &Transaction<'_>, uid: u32) -> Result<Vec<u32>> {
    let mut stmt = tx.prepare_cached("SELECT gid FROM Memberships WHERE uid = ?1")?;
    let gids = stmt
        .query_map(params![uid], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<u32>>>()?;
    Ok(gids)
}

fn drop_empty_groups<'a>(
    tx: &Transaction<'_>,
    candidates: impl Iterator<Item = &'a u32>,
) -> Result<()> {
    for gid in candidates {
        tx.execute(
            r#"
            DELETE FROM Groups
            WHERE gid = ?1
              AND NOT EXISTS (SELECT 1 FROM Memberships WHERE gid = ?1)
            "#,
            params![gid],
        )?;
    }
    Ok(())
}
