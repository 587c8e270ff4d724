// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! The user-database lock and the view it guards.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use nix::fcntl::{Flock, FlockArg};

use crate::entries::{LocalGroup, LocalUser, parse_group, parse_passwd};
use crate::error::{Error, Result};

/// Handle on the OS user database files.
///
/// Holds the lock-file path and the in-process mutex that serializes
/// lockers inside one daemon (`flock()` is per file description, so a
/// second in-process locker has to queue here instead).
pub struct LocalEntries {
    passwd_path: PathBuf,
    group_path: PathBuf,
    lock_path: PathBuf,
    guard: Mutex<()>,
}

impl LocalEntries {
    pub fn new(
        passwd_path: impl Into<PathBuf>,
        group_path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            group_path: group_path.into(),
            lock_path: lock_path.into(),
            guard: Mutex::new(()),
        }
    }

    /// The standard system paths (`/etc/passwd`, `/etc/group`).
    pub fn system(lock_path: impl Into<PathBuf>) -> Self {
        Self::new("/etc/passwd", "/etc/group", lock_path)
    }

    /// Acquire the user-database lock (blocking).
    ///
    /// Takes the in-process mutex, then an exclusive `flock()` on the
    /// lock file (created if missing). Both are released when the
    /// returned guard is dropped.
    pub fn lock(&self) -> Result<LockedEntries<'_>> {
        let guard = self.guard.lock().unwrap_or_else(|poisoned| {
            // A panicking locker cannot have left the OS files in a bad
            // state; the view is read-only and the editor is atomic per
            // invocation.
            poisoned.into_inner()
        });

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| Error::io(&self.lock_path, e))?;

        let flock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| Error::Lock {
            path: self.lock_path.clone(),
            errno,
        })?;

        Ok(LockedEntries {
            _guard: guard,
            _flock: flock,
            passwd_path: &self.passwd_path,
            group_path: &self.group_path,
        })
    }
}

/// A held user-database lock with a stable view of the local entries.
///
/// The lock is released on drop.
pub struct LockedEntries<'a> {
    _guard: MutexGuard<'a, ()>,
    _flock: Flock<File>,
    passwd_path: &'a Path,
    group_path: &'a Path,
}

impl LockedEntries<'_> {
    /// Users from the OS passwd file.
    pub fn local_users(&self) -> Result<Vec<LocalUser>> {
        let content =
            fs::read_to_string(self.passwd_path).map_err(|e| Error::io(self.passwd_path, e))?;
        Ok(parse_passwd(&content))
    }

    /// Groups from the OS group file.
    pub fn local_groups(&self) -> Result<Vec<LocalGroup>> {
        let content =
            fs::read_to_string(self.group_path).map_err(|e| Error::io(self.group_path, e))?;
        Ok(parse_group(&content))
    }

    /// Whether no local user owns `uid`.
    pub fn is_unique_uid(&self, uid: u32) -> Result<bool> {
        Ok(self.local_users()?.iter().all(|u| u.uid != uid))
    }

    /// Whether no local group owns `gid`.
    pub fn is_unique_gid(&self, gid: u32) -> Result<bool> {
        Ok(self.local_groups()?.iter().all(|g| g.gid != gid))
    }

    /// Whether no local user owns `name` (compared case-insensitively,
    /// warden-managed names are always lowercase).
    pub fn is_unique_user_name(&self, name: &str) -> Result<bool> {
        Ok(self
            .local_users()?
            .iter()
            .all(|u| !u.name.eq_ignore_ascii_case(name)))
    }

    /// Whether no local group owns `name`.
    pub fn is_unique_group_name(&self, name: &str) -> Result<bool> {
        Ok(self
            .local_groups()?
            .iter()
            .all(|g| !g.name.eq_ignore_ascii_case(name)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Barrier};

    use tempfile::TempDir;

    use super::*;

    fn fixture(dir: &TempDir) -> LocalEntries {
        let passwd = dir.path().join("passwd");
        let group = dir.path().join("group");
        let mut f = File::create(&passwd).unwrap();
        writeln!(f, "root:x:0:0:root:/root:/bin/bash").unwrap();
        writeln!(f, "bob:x:1001:1001::/home/bob:/bin/sh").unwrap();
        let mut f = File::create(&group).unwrap();
        writeln!(f, "root:x:0:").unwrap();
        writeln!(f, "sudo:x:27:bob").unwrap();
        LocalEntries::new(passwd, group, dir.path().join(".warden.lock"))
    }

    #[test]
    fn test_locked_view_reads_files() {
        let dir = TempDir::new().unwrap();
        let entries = fixture(&dir);

        let locked = entries.lock().unwrap();
        let users = locked.local_users().unwrap();
        assert_eq!(users.len(), 2);
        let groups = locked.local_groups().unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_uniqueness_probes() {
        let dir = TempDir::new().unwrap();
        let entries = fixture(&dir);
        let locked = entries.lock().unwrap();

        assert!(!locked.is_unique_uid(1001).unwrap());
        assert!(locked.is_unique_uid(20000).unwrap());
        assert!(!locked.is_unique_gid(27).unwrap());
        assert!(locked.is_unique_gid(20000).unwrap());
        assert!(!locked.is_unique_user_name("bob").unwrap());
        assert!(!locked.is_unique_user_name("BOB").unwrap());
        assert!(locked.is_unique_user_name("alice").unwrap());
        assert!(!locked.is_unique_group_name("sudo").unwrap());
        assert!(locked.is_unique_group_name("warden").unwrap());
    }

    #[test]
    fn test_lock_is_exclusive_in_process() {
        let dir = TempDir::new().unwrap();
        let entries = Arc::new(fixture(&dir));
        let barrier = Arc::new(Barrier::new(2));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..2 {
            let entries = entries.clone();
            let barrier = barrier.clone();
            let order = order.clone();
            handles.push(std::thread::spawn(move || {
                barrier.wait();
                let _locked = entries.lock().unwrap();
                order.lock().unwrap().push(i);
                std::thread::sleep(std::time::Duration::from_millis(20));
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(order.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_lock_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let entries = fixture(&dir);
        {
            let _locked = entries.lock().unwrap();
        }
        let _locked = entries.lock().unwrap();
    }
}
