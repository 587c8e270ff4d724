// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Invocation of the system group-membership editor.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::lock::LockedEntries;

/// Exit status the editor uses for "no such group".
///
/// Matches shadow-utils `gpasswd`; a group that disappeared between the
/// broker's answer and the edit is not worth failing the request over.
const EXIT_GROUP_NOT_FOUND: i32 = 3;

/// Runs the system group editor (`gpasswd` unless overridden) to add and
/// remove a user from local groups.
pub struct GroupEditor {
    program: PathBuf,
}

impl Default for GroupEditor {
    fn default() -> Self {
        Self::new("gpasswd")
    }
}

impl GroupEditor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Reconcile `user`'s local group memberships from `old` to `new`.
    ///
    /// Adds the user to every group in `new - old` and removes it from
    /// every group in `old - new`, one editor invocation per group. The
    /// caller must hold the user-database lock; taking [`LockedEntries`]
    /// enforces that.
    pub fn update_groups(
        &self,
        _locked: &LockedEntries<'_>,
        user: &str,
        new: &[String],
        old: &[String],
    ) -> Result<()> {
        let new_set: HashSet<&str> = new.iter().map(String::as_str).collect();
        let old_set: HashSet<&str> = old.iter().map(String::as_str).collect();

        for group in new.iter().filter(|g| !old_set.contains(g.as_str())) {
            self.run(&["-a", user, group], group)?;
        }
        for group in old.iter().filter(|g| !new_set.contains(g.as_str())) {
            self.run(&["-d", user, group], group)?;
        }
        Ok(())
    }

    fn run(&self, args: &[&str], group: &str) -> Result<()> {
        debug!("Running {} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| Error::EditorSpawn {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let status = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        if status == EXIT_GROUP_NOT_FOUND {
            warn!("Local group '{group}' does not exist, skipping: {stderr}");
            return Ok(());
        }
        Err(Error::EditorFailed {
            group: group.to_owned(),
            status,
            stderr,
        })
    }
}
