// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! The identity manager: orchestrates the store, the ID generator, the
//! pre-auth register and the local-entry view.
//!
//! All operations are synchronous; RPC handlers call them through
//! `spawn_blocking`. The check-then-write paths run under the
//! user-management mutex, and everything that inspects OS entries or
//! allocates IDs additionally holds the cross-process user-database
//! lock.

use std::os::unix::fs::MetadataExt;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use tokio::sync::mpsc::UnboundedSender;

use warden_local::{GroupEditor, LocalEntries};
use warden_store::{GroupRecord, UserDb, UserRecord};
use warden_types::{GroupEntry, GroupInfo, ShadowEntry, UserEntry, UserInfo};

use crate::error::{DaemonError, Result};
use crate::idgen::{IdGenerator, IdRanges, PendingId};
use crate::preauth::{PreAuthCompletion, PreAuthRegister};

/// Orchestrates identity state.
pub struct IdentityManager {
    store: Mutex<UserDb>,
    local: LocalEntries,
    editor: GroupEditor,
    idgen: IdGenerator,
    preauth: Arc<PreAuthRegister>,
    /// Guards every check-then-write path so concurrent requests for the
    /// same or conflicting names cannot race through uniqueness checks.
    user_lock: Mutex<()>,
    corruption_tx: Option<UnboundedSender<()>>,
}

impl IdentityManager {
    pub fn new(
        store: UserDb,
        local: LocalEntries,
        editor: GroupEditor,
        ranges: IdRanges,
        corruption_tx: Option<UnboundedSender<()>>,
    ) -> Self {
        Self {
            store: Mutex::new(store),
            local,
            editor,
            idgen: IdGenerator::new(ranges),
            preauth: PreAuthRegister::new(),
            user_lock: Mutex::new(()),
            corruption_tx,
        }
    }

    /// Run a store operation; a corruption error flags the database and
    /// signals the rebuild channel before propagating.
    fn with_store<T>(&self, op: impl FnOnce(&mut UserDb) -> warden_store::Result<T>) -> Result<T> {
        let mut store = self.store.lock().unwrap();
        match op(&mut store) {
            Err(e) if e.is_corrupt() => {
                warn!("Store corruption detected: {e}");
                store.mark_dirty();
                if let Some(tx) = &self.corruption_tx {
                    let _ = tx.send(());
                }
                Err(e.into())
            }
            other => other.map_err(Into::into),
        }
    }

    /// Register a temporary user ahead of its first authentication.
    ///
    /// Returns the existing UID when the user is already persisted or
    /// already pre-registered; otherwise allocates a fresh UID under the
    /// user-database lock and records the pre-auth entry.
    pub fn register_user_preauth(&self, name: &str) -> Result<u32> {
        let name = normalize_name(name)?;

        // Fast path without any lock.
        match self.with_store(|db| db.user_by_name(&name)) {
            Ok(user) => return Ok(user.uid),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let _guard = self.user_lock.lock().unwrap();

        // Recheck: a concurrent caller may have won the race.
        match self.with_store(|db| db.user_by_name(&name)) {
            Ok(user) => return Ok(user.uid),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        if let Some(record) = self.preauth.user_by_login(&name) {
            return Ok(record.uid);
        }

        let locked = self.local.lock()?;
        if !locked.is_unique_user_name(&name)? {
            return Err(DaemonError::Conflict(format!(
                "user '{name}' already exists on this host"
            )));
        }

        let (uids, gids) = self.used_ids()?;
        let pending = self.idgen.generate_uid(&locked, &uids, &gids)?;
        let uid = pending.id();
        // Once registered, the id is visible through used_ids() and the
        // pending reservation can lapse.
        self.preauth.register(&name, uid);
        info!("Pre-auth user {name} registered with uid {uid}");
        Ok(uid)
    }

    /// Create or update a user from a broker descriptor.
    pub fn update_user(&self, info: &UserInfo) -> Result<()> {
        let name = normalize_name(&info.name)?;

        // The private group always comes first; broker group names are
        // lowercased like user names.
        let mut groups: Vec<GroupInfo> = Vec::with_capacity(info.groups.len() + 1);
        groups.push(GroupInfo {
            name: name.clone(),
            gid: None,
            ugid: name.clone(),
        });
        for group in &info.groups {
            let group_name = group.name.to_lowercase();
            if group_name.is_empty() {
                return Err(DaemonError::InvalidInput("empty group name".to_owned()));
            }
            groups.push(GroupInfo {
                name: group_name,
                gid: group.gid,
                ugid: group.ugid.clone(),
            });
        }

        let _guard = self.user_lock.lock().unwrap();

        let existing = match self.with_store(|db| db.user_by_name(&name)) {
            Ok(user) => Some(user),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let (stored_groups, stored_locals) = match &existing {
            Some(user) => (
                self.with_store(|db| db.groups_of_user(user.uid))?,
                self.with_store(|db| db.local_groups_of_user(user.uid))?,
            ),
            None => (Vec::new(), Vec::new()),
        };

        if let Some(user) = &existing {
            if let Some(requested) = info.uid {
                if requested != user.uid {
                    return Err(DaemonError::Conflict(format!(
                        "uid of user '{name}' is {} and cannot change to {requested}",
                        user.uid
                    )));
                }
            }
            if unchanged(info, &groups, user, &stored_groups, &stored_locals) {
                debug!("User {name} is unchanged, skipping update");
                return Ok(());
            }
        }

        let locked = self.local.lock()?;

        let mut pending_ids: Vec<PendingId> = Vec::new();
        let mut completion: Option<PreAuthCompletion> = None;

        let uid = if let Some(user) = &existing {
            user.uid
        } else if let Some((uid, done)) = self.preauth.maybe_complete(&name) {
            completion = Some(done);
            uid
        } else {
            if !locked.is_unique_user_name(&name)? {
                return Err(DaemonError::Conflict(format!(
                    "user '{name}' already exists on this host"
                )));
            }
            let (uids, gids) = self.used_ids()?;
            let pending = self.idgen.generate_uid(&locked, &uids, &gids)?;
            let uid = pending.id();
            pending_ids.push(pending);
            uid
        };

        let mut group_rows: Vec<GroupRecord> = Vec::new();
        let mut local_groups: Vec<String> = Vec::new();
        for (i, group) in groups.iter().enumerate() {
            if i == 0 {
                group_rows.push(GroupRecord {
                    name: name.clone(),
                    gid: uid,
                    ugid: name.clone(),
                });
                continue;
            }
            if group.ugid.is_empty() {
                local_groups.push(group.name.clone());
                continue;
            }

            match self.resolve_group(group)? {
                Some(gid) => group_rows.push(GroupRecord {
                    name: group.name.clone(),
                    gid,
                    ugid: group.ugid.clone(),
                }),
                None => {
                    if !locked.is_unique_group_name(&group.name)? {
                        return Err(DaemonError::Conflict(format!(
                            "group '{}' already exists on this host",
                            group.name
                        )));
                    }
                    let (uids, gids) = self.used_ids()?;
                    let pending = self.idgen.generate_gid(&locked, &uids, &gids)?;
                    group_rows.push(GroupRecord {
                        name: group.name.clone(),
                        gid: pending.id(),
                        ugid: group.ugid.clone(),
                    });
                    pending_ids.push(pending);
                }
            }
        }

        let record = UserRecord {
            name: name.clone(),
            uid,
            gid: uid,
            gecos: info.gecos.clone(),
            dir: info.dir.clone(),
            shell: info.shell.clone(),
            broker_id: existing
                .as_ref()
                .map(|u| u.broker_id.clone())
                .unwrap_or_default(),
            disabled: existing.as_ref().is_some_and(|u| u.disabled),
            last_login: unix_now(),
        };

        self.with_store(|db| db.upsert_user(&record, &group_rows, &local_groups))?;
        self.editor
            .update_groups(&locked, &name, &local_groups, &stored_locals)?;

        if let Some(done) = completion {
            done.complete();
        }
        drop(pending_ids);
        drop(locked);

        info!("User {name} (uid {uid}) persisted");
        self.check_home_ownership(&record);
        Ok(())
    }

    /// Resolve an existing broker group, by UGID first so renames keep
    /// their GID, then by name for groups seen before UGIDs were known.
    fn resolve_group(&self, group: &GroupInfo) -> Result<Option<u32>> {
        match self.with_store(|db| db.group_by_ugid(&group.ugid)) {
            Ok(row) => return Ok(Some(row.gid)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.with_store(|db| db.group_by_name(&group.name)) {
            Ok(row) => {
                if !row.ugid.is_empty() && row.ugid != group.ugid {
                    return Err(DaemonError::Conflict(format!(
                        "group name '{}' already belongs to a different provider group",
                        group.name
                    )));
                }
                Ok(Some(row.gid))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Log an advisory when the home directory is owned by someone else.
    /// Ownership problems never fail the request.
    fn check_home_ownership(&self, user: &UserRecord) {
        if user.dir.is_empty() {
            return;
        }
        if let Ok(meta) = std::fs::metadata(&user.dir) {
            if meta.uid() != user.uid || meta.gid() != user.gid {
                warn!(
                    "Home directory {} of user {} is owned by {}:{}, expected {}:{}",
                    user.dir,
                    user.name,
                    meta.uid(),
                    meta.gid(),
                    user.uid,
                    user.gid
                );
            }
        }
    }

    /// All UIDs and GIDs the daemon considers taken: persisted rows plus
    /// pre-auth reservations.
    pub fn used_ids(&self) -> Result<(Vec<u32>, Vec<u32>)> {
        let (mut uids, gids) = self.with_store(|db| db.used_ids())?;
        uids.extend(self.preauth.used_ids());
        Ok((uids, gids))
    }

    pub fn user_by_name(&self, name: &str) -> Result<UserEntry> {
        let name = name.to_lowercase();
        match self.with_store(|db| db.user_by_name(&name)) {
            Ok(user) => Ok(user.to_entry()),
            Err(e) if e.is_not_found() => self
                .preauth
                .user_by_login(&name)
                .map(|r| r.to_entry())
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    pub fn user_by_id(&self, uid: u32) -> Result<UserEntry> {
        match self.with_store(|db| db.user_by_id(uid)) {
            Ok(user) => Ok(user.to_entry()),
            Err(e) if e.is_not_found() => self
                .preauth
                .user_by_id(uid)
                .map(|r| r.to_entry())
                .ok_or(e),
            Err(e) => Err(e),
        }
    }

    pub fn group_by_name(&self, name: &str) -> Result<GroupEntry> {
        let name = name.to_lowercase();
        let group = self.with_store(|db| db.group_by_name(&name))?;
        Ok(self
            .with_store(|db| db.group_with_members(group.gid))?
            .to_entry())
    }

    pub fn group_by_id(&self, gid: u32) -> Result<GroupEntry> {
        match self.with_store(|db| db.group_with_members(gid)) {
            Ok(group) => Ok(group.to_entry()),
            Err(e) if e.is_not_found() => self.preauth.group_by_id(gid).ok_or(e),
            Err(e) => Err(e),
        }
    }

    /// All persisted users. Pre-auth entries are deliberately excluded
    /// so `getent passwd` stays uncluttered.
    pub fn all_users(&self) -> Result<Vec<UserEntry>> {
        Ok(self
            .with_store(|db| db.all_users())?
            .iter()
            .map(UserRecord::to_entry)
            .collect())
    }

    pub fn all_groups(&self) -> Result<Vec<GroupEntry>> {
        Ok(self
            .with_store(|db| db.all_groups_with_members())?
            .iter()
            .map(|g| g.to_entry())
            .collect())
    }

    /// Shadow entries exist for every persisted user but never carry
    /// password ages; the sentinel -1 marks every field unset.
    pub fn shadow_by_name(&self, name: &str) -> Result<ShadowEntry> {
        let name = name.to_lowercase();
        let user = self.with_store(|db| db.user_by_name(&name))?;
        Ok(ShadowEntry::unset(user.name))
    }

    pub fn all_shadows(&self) -> Result<Vec<ShadowEntry>> {
        Ok(self
            .with_store(|db| db.all_users())?
            .into_iter()
            .map(|u| ShadowEntry::unset(u.name))
            .collect())
    }

    pub fn broker_for_user(&self, name: &str) -> Result<String> {
        let name = name.to_lowercase();
        self.with_store(|db| db.broker_for_user(&name))
    }

    pub fn update_broker_for_user(&self, name: &str, broker_id: &str) -> Result<()> {
        let name = name.to_lowercase();
        let user = self.with_store(|db| db.user_by_name(&name))?;
        self.with_store(|db| db.set_broker_for_user(user.uid, broker_id))
    }

    pub fn enable_user(&self, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        self.with_store(|db| db.set_user_disabled(&name, false))
    }

    pub fn disable_user(&self, name: &str) -> Result<()> {
        let name = name.to_lowercase();
        self.with_store(|db| db.set_user_disabled(&name, true))
    }

    /// Whether the user exists and is disabled. Unknown users are not
    /// disabled; they simply have not authenticated yet.
    pub fn user_disabled(&self, name: &str) -> Result<bool> {
        let name = name.to_lowercase();
        match self.with_store(|db| db.user_by_name(&name)) {
            Ok(user) => Ok(user.disabled),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Remove users idle since before `cutoff` that are not in `active`.
    pub fn clean_expired(
        &self,
        active: &std::collections::HashSet<String>,
        cutoff: i64,
    ) -> Result<Vec<String>> {
        self.with_store(|db| db.clean_expired_users(active, cutoff))
    }

    /// Clear the store after a corruption signal and drop the dirty flag.
    pub fn rebuild_store(&self) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        store.clear()?;
        store.remove_dirty_flag();
        Ok(())
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.to_lowercase();
    if name.is_empty() {
        return Err(DaemonError::InvalidInput("empty user name".to_owned()));
    }
    Ok(name)
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Structural equality between an incoming descriptor and the stored
/// state, with the stored UID and matched GIDs overlaid so a descriptor
/// without IDs still compares equal.
fn unchanged(
    info: &UserInfo,
    groups: &[GroupInfo],
    user: &UserRecord,
    stored_groups: &[GroupRecord],
    stored_locals: &[String],
) -> bool {
    if user.gecos != info.gecos || user.dir != info.dir || user.shell != info.shell {
        return false;
    }

    let mut incoming_broker: Vec<(String, String, u32)> = Vec::new();
    let mut incoming_local: Vec<String> = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 && group.ugid.is_empty() {
            incoming_local.push(group.name.clone());
            continue;
        }
        let stored = stored_groups
            .iter()
            .find(|s| s.ugid == group.ugid)
            .or_else(|| {
                stored_groups
                    .iter()
                    .find(|s| s.ugid.is_empty() && s.name == group.name)
            });
        let Some(stored) = stored else {
            // A group the user is not yet in; the update must run.
            return false;
        };
        if group.gid.is_some_and(|gid| gid != stored.gid) {
            return false;
        }
        incoming_broker.push((group.name.clone(), group.ugid.clone(), stored.gid));
    }

    let mut stored_broker: Vec<(String, String, u32)> = stored_groups
        .iter()
        .map(|s| (s.name.clone(), s.ugid.clone(), s.gid))
        .collect();
    incoming_broker.sort();
    stored_broker.sort();
    if incoming_broker != stored_broker {
        return false;
    }

    let mut incoming_local = incoming_local;
    incoming_local.sort();
    incoming_local.dedup();
    let mut stored_locals = stored_locals.to_vec();
    stored_locals.sort();
    incoming_local == stored_locals
}
