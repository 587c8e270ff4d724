// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! UID/GID allocation from the configured cloud range.
//!
//! UIDs and GIDs share one namespace: a user's private group reuses its
//! UID as GID, so a candidate must avoid every UID *and* GID the store,
//! the pre-auth register or the local OS files already use. The caller
//! holds the user-database lock; within one process concurrent
//! allocations additionally coordinate through the pending set, which a
//! returned [`PendingId`] pops on drop.

use std::sync::{Arc, Mutex};

use log::debug;
use warden_local::LockedEntries;

use crate::error::{DaemonError, Result};

/// Candidate probes before the allocator gives up on a range.
const MAX_ATTEMPTS: u64 = 10_000;

/// IDs that must never be issued.
const RESERVED_IDS: &[u32] = &[0, 65534, 65535, u32::MAX];

/// Host identity-system ranges that must never be issued (inclusive):
/// systemd-homed users, dynamic service users and container mappings.
const RESERVED_RANGES: &[(u32, u32)] = &[
    (60001, 60513),
    (SYSTEMD_DYNAMIC_MIN, SYSTEMD_DYNAMIC_MAX),
    (524288, 1_879_048_191),
];

/// systemd dynamic-service-user range; configured ranges may not touch it.
pub const SYSTEMD_DYNAMIC_MIN: u32 = 61184;
pub const SYSTEMD_DYNAMIC_MAX: u32 = 65519;

fn is_reserved(id: u32) -> bool {
    RESERVED_IDS.contains(&id)
        || RESERVED_RANGES
            .iter()
            .any(|(lo, hi)| (*lo..=*hi).contains(&id))
}

/// Configured allocation ranges, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRanges {
    pub uid_min: u32,
    pub uid_max: u32,
    pub gid_min: u32,
    pub gid_max: u32,
}

impl IdRanges {
    /// Check the construction-time constraints: ordered bounds inside
    /// [1000, i32::MAX], no overlap with the systemd dynamic range and
    /// enough head-room for twice the pre-auth capacity.
    pub fn validate(&self, min_width: u32) -> Result<()> {
        for (what, min, max) in [
            ("UID", self.uid_min, self.uid_max),
            ("GID", self.gid_min, self.gid_max),
        ] {
            if min < 1000 {
                return Err(DaemonError::config(format!(
                    "{what} range must start at or above 1000, got {min}"
                )));
            }
            if min >= max {
                return Err(DaemonError::config(format!(
                    "{what} range is empty: [{min}, {max}]"
                )));
            }
            if max > i32::MAX as u32 {
                return Err(DaemonError::config(format!(
                    "{what} range must end at or below {}, got {max}",
                    i32::MAX
                )));
            }
            if min <= SYSTEMD_DYNAMIC_MAX && max >= SYSTEMD_DYNAMIC_MIN {
                return Err(DaemonError::config(format!(
                    "{what} range [{min}, {max}] overlaps the systemd dynamic \
                     service range [{SYSTEMD_DYNAMIC_MIN}, {SYSTEMD_DYNAMIC_MAX}]"
                )));
            }
            if max - min + 1 < min_width {
                return Err(DaemonError::config(format!(
                    "{what} range [{min}, {max}] is narrower than {min_width} ids"
                )));
            }
        }
        Ok(())
    }
}

/// A reserved-but-not-yet-persisted ID. Popped from the pending set on
/// drop.
#[derive(Debug)]
pub struct PendingId {
    id: u32,
    pending: Arc<Mutex<Vec<u32>>>,
}

impl PendingId {
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for PendingId {
    fn drop(&mut self) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|id| *id == self.id) {
            pending.swap_remove(pos);
        }
    }
}

/// Allocates unused IDs from the configured ranges.
pub struct IdGenerator {
    ranges: IdRanges,
    pending: Arc<Mutex<Vec<u32>>>,
}

impl IdGenerator {
    pub fn new(ranges: IdRanges) -> Self {
        Self {
            ranges,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Allocate a UID that collides with nothing the owner or the OS
    /// uses. `owner_uids`/`owner_gids` are the persisted plus pre-auth
    /// IDs of the caller.
    pub fn generate_uid(
        &self,
        locked: &LockedEntries<'_>,
        owner_uids: &[u32],
        owner_gids: &[u32],
    ) -> Result<PendingId> {
        self.generate(
            self.ranges.uid_min,
            self.ranges.uid_max,
            locked,
            owner_uids,
            owner_gids,
        )
    }

    /// Allocate a GID under the same collision rules.
    pub fn generate_gid(
        &self,
        locked: &LockedEntries<'_>,
        owner_uids: &[u32],
        owner_gids: &[u32],
    ) -> Result<PendingId> {
        self.generate(
            self.ranges.gid_min,
            self.ranges.gid_max,
            locked,
            owner_uids,
            owner_gids,
        )
    }

    fn generate(
        &self,
        min: u32,
        max: u32,
        locked: &LockedEntries<'_>,
        owner_uids: &[u32],
        owner_gids: &[u32],
    ) -> Result<PendingId> {
        let mut used: Vec<u32> = Vec::new();
        used.extend_from_slice(owner_uids);
        used.extend_from_slice(owner_gids);
        for user in locked.local_users()? {
            used.push(user.uid);
            used.push(user.gid);
        }
        for group in locked.local_groups()? {
            used.push(group.gid);
        }
        used.extend(self.pending.lock().unwrap().iter().copied());

        used.sort_unstable();
        used.dedup();
        used.retain(|id| (min..=max).contains(id));

        let width = u64::from(max - min) + 1;
        let budget = MAX_ATTEMPTS.min(width);

        // Lowest legal candidate above the highest used ID; monotone
        // growth under steady state, wrapping to the low half of the
        // range only once the top is exhausted.
        let preferred = used.last().map_or(min, |last| last + 1);
        let wrap_end = preferred.min(max);

        let mut attempts = 0u64;
        for candidate in (preferred..=max).chain(min..wrap_end) {
            attempts += 1;
            if attempts > budget {
                break;
            }
            if used.binary_search(&candidate).is_ok() {
                continue;
            }
            if is_reserved(candidate) {
                let pos = used.partition_point(|id| *id < candidate);
                used.insert(pos, candidate);
                continue;
            }

            self.pending.lock().unwrap().push(candidate);
            debug!("Allocated id {candidate} from [{min}, {max}]");
            return Ok(PendingId {
                id: candidate,
                pending: self.pending.clone(),
            });
        }

        Err(DaemonError::ExhaustedRange { min, max })
    }
}
