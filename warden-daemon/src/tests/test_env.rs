// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Test helper providing a self-contained identity manager backed by a
//! temporary state directory, fixture passwd/group files and a fake
//! group editor that records its invocations.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use warden_local::{GroupEditor, LocalEntries};
use warden_store::{UserDb, UserRecord};

use crate::idgen::IdRanges;
use crate::manager::IdentityManager;

pub const DEFAULT_PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n";
pub const DEFAULT_GROUP: &str = "root:x:0:\n";

/// A self-contained identity manager.
///
/// Owns a temporary directory holding the store, the passwd/group
/// fixtures, the lock file and the fake editor. The editor appends each
/// invocation to `editor_log` and exits 3 for groups named "missing".
pub struct TestEnv {
    pub manager: Arc<IdentityManager>,
    pub editor_log: PathBuf,
    dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self::with_local_entries(DEFAULT_PASSWD, DEFAULT_GROUP)
    }

    pub fn with_local_entries(passwd: &str, group: &str) -> Self {
        Self::build(passwd, group, |_| {})
    }

    /// Build the environment, letting `setup` seed the store before the
    /// manager takes ownership of it.
    pub fn build(passwd: &str, group: &str, setup: impl FnOnce(&mut UserDb)) -> Self {
        let dir = TempDir::new().unwrap();
        let state_dir = dir.path().join("state");

        let passwd_path = dir.path().join("passwd");
        let group_path = dir.path().join("group");
        fs::write(&passwd_path, passwd).unwrap();
        fs::write(&group_path, group).unwrap();

        let editor_log = dir.path().join("editor.log");
        let editor_path = dir.path().join("fake-gpasswd");
        fs::write(
            &editor_path,
            format!(
                "#!/bin/sh\necho \"$@\" >> {}\ncase \"$3\" in\n  missing) exit 3 ;;\nesac\nexit 0\n",
                editor_log.display()
            ),
        )
        .unwrap();
        let mut perms = fs::metadata(&editor_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&editor_path, perms).unwrap();

        let mut store = UserDb::open(&state_dir).unwrap();
        setup(&mut store);

        let local = LocalEntries::new(passwd_path, group_path, dir.path().join(".pwd.lock"));
        let editor = GroupEditor::new(editor_path);
        let manager = Arc::new(IdentityManager::new(
            store,
            local,
            editor,
            IdRanges {
                uid_min: 10000,
                uid_max: 60000,
                gid_min: 10000,
                gid_max: 60000,
            },
            None,
        ));

        Self {
            manager,
            editor_log,
            dir,
        }
    }

    /// Editor invocations so far, one `"-a user group"`-style line each.
    pub fn editor_calls(&self) -> Vec<String> {
        match fs::read_to_string(&self.editor_log) {
            Ok(content) => content.lines().map(str::to_owned).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// A fake process directory containing one numeric entry owned by
    /// the current test user.
    pub fn fake_proc_dir(&self) -> PathBuf {
        let proc_dir = self.dir.path().join("proc");
        fs::create_dir_all(proc_dir.join("4242")).unwrap();
        proc_dir
    }
}

/// The UID the test process runs as.
pub fn current_uid() -> u32 {
    fs::metadata("/proc/self").map(|m| m.uid()).unwrap_or(0)
}

/// A persisted user row for store seeding.
pub fn seeded_user(name: &str, uid: u32, last_login: i64) -> UserRecord {
    UserRecord {
        name: name.to_owned(),
        uid,
        gid: uid,
        gecos: String::new(),
        dir: format!("/home/{name}"),
        shell: "/bin/sh".to_owned(),
        broker_id: String::new(),
        disabled: false,
        last_login,
    }
}
