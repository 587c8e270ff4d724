// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! In-memory register of pre-authentication users.
//!
//! A pre-auth user owns a freshly allocated UID and is visible to NSS
//! lookups before its first successful full authentication persists it.
//! The register is a bounded LRU; registering past capacity evicts the
//! least recently touched record, whose UID then simply returns to the
//! allocatable pool.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use log::{debug, info};
use warden_types::{GroupEntry, UserEntry};

/// Capacity of the register.
pub const MAX_PREAUTH_USERS: usize = 64;

/// Placeholder fields of a not-yet-persisted user.
const PREAUTH_GECOS: &str = "warden pre-auth user";
const PREAUTH_DIR: &str = "/nonexistent";
const PREAUTH_SHELL: &str = "/usr/sbin/nologin";

/// One pre-auth record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreAuthRecord {
    pub name: String,
    pub uid: u32,
}

impl PreAuthRecord {
    /// The passwd-style view of this record.
    pub fn to_entry(&self) -> UserEntry {
        UserEntry {
            name: self.name.clone(),
            uid: self.uid,
            gid: self.uid,
            gecos: PREAUTH_GECOS.to_owned(),
            dir: PREAUTH_DIR.to_owned(),
            shell: PREAUTH_SHELL.to_owned(),
        }
    }

    /// The synthetic private group of this record.
    pub fn to_group_entry(&self) -> GroupEntry {
        GroupEntry {
            name: self.name.clone(),
            gid: self.uid,
            users: vec![self.name.clone()],
            passwd: "x".to_owned(),
        }
    }
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, PreAuthRecord>,
    /// Recency order, oldest at the front.
    order: VecDeque<String>,
}

impl Inner {
    fn touch(&mut self, name: &str) {
        if let Some(pos) = self.order.iter().position(|n| n == name) {
            self.order.remove(pos);
            self.order.push_back(name.to_owned());
        }
    }
}

/// The bounded pre-auth register.
#[derive(Default)]
pub struct PreAuthRegister {
    inner: Mutex<Inner>,
}

impl PreAuthRegister {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a record, evicting the least recently used one when the
    /// register is full.
    pub fn register(&self, name: &str, uid: u32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.by_name.contains_key(name) {
            // Keep the first allocation; re-registering only refreshes
            // recency.
            inner.touch(name);
            return;
        }
        if inner.by_name.len() >= MAX_PREAUTH_USERS {
            if let Some(evicted) = inner.order.pop_front() {
                inner.by_name.remove(&evicted);
                info!("Evicted pre-auth user {evicted} (register full)");
            }
        }
        inner.by_name.insert(
            name.to_owned(),
            PreAuthRecord {
                name: name.to_owned(),
                uid,
            },
        );
        inner.order.push_back(name.to_owned());
        debug!("Registered pre-auth user {name} with uid {uid}");
    }

    /// The pending UID for `name`, plus a releaser that removes the
    /// record once the user has been persisted.
    pub fn maybe_complete(&self, name: &str) -> Option<(u32, PreAuthCompletion<'_>)> {
        let mut inner = self.inner.lock().unwrap();
        let uid = inner.by_name.get(name)?.uid;
        inner.touch(name);
        Some((
            uid,
            PreAuthCompletion {
                register: self,
                name: name.to_owned(),
            },
        ))
    }

    pub fn user_by_login(&self, name: &str) -> Option<PreAuthRecord> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.by_name.get(name)?.clone();
        inner.touch(name);
        Some(record)
    }

    pub fn user_by_id(&self, uid: u32) -> Option<PreAuthRecord> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner.by_name.values().find(|r| r.uid == uid)?.clone();
        inner.touch(&record.name);
        Some(record)
    }

    /// The synthetic private group of a pre-auth record.
    pub fn group_by_id(&self, gid: u32) -> Option<GroupEntry> {
        self.user_by_id(gid).map(|r| r.to_group_entry())
    }

    pub fn all_users(&self) -> Vec<PreAuthRecord> {
        let inner = self.inner.lock().unwrap();
        let mut users: Vec<_> = inner.by_name.values().cloned().collect();
        users.sort_by_key(|r| r.uid);
        users
    }

    /// All UIDs currently reserved by pre-auth records.
    pub fn used_ids(&self) -> Vec<u32> {
        self.inner
            .lock()
            .unwrap()
            .by_name
            .values()
            .map(|r| r.uid)
            .collect()
    }

    fn remove(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.by_name.remove(name);
        if let Some(pos) = inner.order.iter().position(|n| n == name) {
            inner.order.remove(pos);
        }
    }
}

/// Releaser handed out by [`PreAuthRegister::maybe_complete`].
///
/// Calling [`PreAuthCompletion::complete`] removes the record; dropping
/// the releaser without completing keeps it, so a failed update leaves
/// the pre-auth user intact for a retry.
pub struct PreAuthCompletion<'a> {
    register: &'a PreAuthRegister,
    name: String,
}

impl PreAuthCompletion<'_> {
    pub fn complete(self) {
        self.register.remove(&self.name);
    }
}
