// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Periodic eviction of long-idle users.
//!
//! Users whose last login predates the configured expiration are removed
//! from the store, unless they still own a live process. The same task
//! services coalesced corruption signals by clearing and re-flagging the
//! store.

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{error, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;
use crate::manager::IdentityManager;

/// The expiration sweeper task.
pub struct Sweeper {
    manager: Arc<IdentityManager>,
    proc_dir: PathBuf,
    expiration: Duration,
    interval: Duration,
}

impl Sweeper {
    pub fn new(manager: Arc<IdentityManager>, expiration: Duration, interval: Duration) -> Self {
        Self {
            manager,
            proc_dir: PathBuf::from("/proc"),
            expiration,
            interval,
        }
    }

    /// Override the process directory (for tests).
    pub fn with_proc_dir(mut self, proc_dir: impl Into<PathBuf>) -> Self {
        self.proc_dir = proc_dir.into();
        self
    }

    /// Run forever: sweep on every interval tick and rebuild the store
    /// whenever a corruption signal arrives. Back-to-back signals
    /// coalesce into one rebuild.
    pub async fn run(self, mut corruption_rx: UnboundedReceiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let sweeper = Arc::new(self);

        loop {
            let sweeper = sweeper.clone();
            tokio::select! {
                _ = ticker.tick() => {
                    let result = tokio::task::spawn_blocking(move || sweeper.sweep_once()).await;
                    match result {
                        Ok(Ok(cleaned)) if !cleaned.is_empty() => {
                            info!("Expiration sweep removed users: {}", cleaned.join(", "));
                        }
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("Expiration sweep failed: {e}"),
                        Err(e) => error!("Expiration sweep panicked: {e}"),
                    }
                }
                signal = corruption_rx.recv() => {
                    if signal.is_none() {
                        return;
                    }
                    while corruption_rx.try_recv().is_ok() {}
                    warn!("Corruption signal received, rebuilding the user database");
                    let result = tokio::task::spawn_blocking(move || sweeper.manager.rebuild_store()).await;
                    match result {
                        Ok(Ok(())) => info!("User database cleared after corruption"),
                        Ok(Err(e)) => error!("Failed to rebuild the user database: {e}"),
                        Err(e) => error!("Store rebuild panicked: {e}"),
                    }
                }
            }
        }
    }

    /// One synchronous sweep pass. Returns the evicted user names.
    pub fn sweep_once(&self) -> Result<Vec<String>> {
        let active = self.active_users()?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let cutoff = now - self.expiration.as_secs() as i64;
        self.manager.clean_expired(&active, cutoff)
    }

    /// Names of warden-managed users owning at least one live process.
    fn active_users(&self) -> Result<HashSet<String>> {
        let mut owner_uids: HashSet<u32> = HashSet::new();
        let entries = match fs::read_dir(&self.proc_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    "Cannot read process directory {}: {e}",
                    self.proc_dir.display()
                );
                return Ok(HashSet::new());
            }
        };
        for entry in entries.flatten() {
            // Process directories are purely numeric.
            if !entry
                .file_name()
                .to_string_lossy()
                .bytes()
                .all(|b| b.is_ascii_digit())
            {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                owner_uids.insert(meta.uid());
            }
        }

        let active = self
            .manager
            .all_users()?
            .into_iter()
            .filter(|user| owner_uids.contains(&user.uid))
            .map(|user| user.name)
            .collect();
        Ok(active)
    }
}
