use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DaemonError, IoContext};
use crate::idgen::IdRanges;
use crate::preauth::MAX_PREAUTH_USERS;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Path to bind the daemon socket
    pub socket_path: PathBuf,

    /// Directory holding the user database and its dirty flag
    pub state_dir: PathBuf,

    /// OS passwd file consulted for uniqueness checks
    pub passwd_path: PathBuf,

    /// OS group file consulted for uniqueness checks
    pub group_path: PathBuf,

    /// Cross-process lock file guarding the user database.
    ///
    /// Defaults to the lock shadow-utils tooling also honors.
    pub userdb_lock_path: PathBuf,

    /// Binary invoked to edit local group memberships
    pub group_editor: PathBuf,

    /// Lower bound of the UID allocation range
    pub uid_min: u32,
    /// Upper bound of the UID allocation range
    pub uid_max: u32,
    /// Lower bound of the GID allocation range
    pub gid_min: u32,
    /// Upper bound of the GID allocation range
    pub gid_max: u32,

    /// Days of inactivity before a user is swept from the store
    pub expiration_days: u64,

    /// Seconds between expiration sweeps
    pub cleanup_interval_secs: u64,

    /// Seconds wait-bearing broker modes block before timing out
    pub broker_wait_secs: u64,

    /// Log level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/warden.sock"),
            state_dir: PathBuf::from("/var/lib/warden"),
            passwd_path: PathBuf::from("/etc/passwd"),
            group_path: PathBuf::from("/etc/group"),
            userdb_lock_path: PathBuf::from("/etc/.pwd.lock"),
            group_editor: PathBuf::from("gpasswd"),
            uid_min: 65536,
            uid_max: 99999,
            gid_min: 65536,
            gid_max: 99999,
            expiration_days: 180,
            cleanup_interval_secs: 24 * 60 * 60,
            broker_wait_secs: 5,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, DaemonError> {
        let contents = std::fs::read_to_string(path)
            .io_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ID generator cannot work with.
    pub fn validate(&self) -> Result<(), DaemonError> {
        self.id_ranges().validate(2 * MAX_PREAUTH_USERS as u32)
    }

    pub fn id_ranges(&self) -> IdRanges {
        IdRanges {
            uid_min: self.uid_min,
            uid_max: self.uid_max,
            gid_min: self.gid_min,
            gid_max: self.gid_max,
        }
    }

    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_days * 24 * 60 * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn broker_wait(&self) -> Duration {
        Duration::from_secs(self.broker_wait_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warden.toml");
        fs::write(
            &path,
            r#"
            uid_min = 200000
            uid_max = 299999
            expiration_days = 30
            "#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.uid_min, 200000);
        assert_eq!(config.uid_max, 299999);
        assert_eq!(config.expiration_days, 30);
        // Untouched fields keep their defaults.
        assert_eq!(config.gid_min, 65536);
    }

    #[test]
    fn test_invalid_range_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("warden.toml");
        fs::write(&path, "uid_min = 99999\nuid_max = 65536\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
