// SPDX-FileCopyrightText: 2026 The warden developers
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use rusqlite::{Connection, OpenFlags};

use crate::error::{Error, Result};
use crate::schema::{SCHEMA_SQL, SCHEMA_VERSION};

/// Database file name inside the state directory.
pub const DB_FILENAME: &str = "warden.db";

/// Dirty-flag file name; its presence forces a clear-and-rebuild on open.
pub const DIRTY_FLAG_FILENAME: &str = "warden.db.dirty";

/// SQLite-backed store of warden identities.
pub struct UserDb {
    pub(crate) conn: Connection,
    dirty_flag: PathBuf,
}

impl UserDb {
    /// Open (or create) the store inside `state_dir`.
    ///
    /// If the dirty flag is present the existing database is discarded
    /// first. The database file is created with mode 0600.
    pub fn open(state_dir: &Path) -> Result<Self> {
        let db_path = state_dir.join(DB_FILENAME);
        let dirty_flag = state_dir.join(DIRTY_FLAG_FILENAME);

        fs::create_dir_all(state_dir).map_err(|e| Error::DatabaseSetup {
            path: state_dir.to_owned(),
            source: e,
        })?;

        if dirty_flag.exists() {
            warn!(
                "Database at {} was marked dirty, clearing it",
                db_path.display()
            );
            remove_db_files(&db_path)?;
            fs::remove_file(&dirty_flag).map_err(|e| Error::DatabaseSetup {
                path: dirty_flag.clone(),
                source: e,
            })?;
        }

        let conn = Connection::open_with_flags(
            &db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| Error::DatabaseOpen {
            path: db_path.clone(),
            source: e,
        })?;

        let mut perms = fs::metadata(&db_path)
            .map_err(|e| Error::DatabaseSetup {
                path: db_path.clone(),
                source: e,
            })?
            .permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&db_path, perms).map_err(|e| Error::DatabaseSetup {
            path: db_path.clone(),
            source: e,
        })?;

        let db = Self { conn, dirty_flag };
        db.configure_pragmas()?;
        db.create_schema()?;

        debug!("Opened database at {}", db_path.display());
        Ok(db)
    }

    /// Create an in-memory store (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            dirty_flag: PathBuf::new(),
        };
        db.configure_pragmas()?;
        db.create_schema()?;
        debug!("Created in-memory database");
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// Drop every row while keeping the schema in place.
    ///
    /// Used by the rebuild path after a corruption signal.
    pub fn clear(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM Memberships", [])?;
        tx.execute("DELETE FROM LocalGroups", [])?;
        tx.execute("DELETE FROM Groups", [])?;
        tx.execute("DELETE FROM Users", [])?;
        tx.commit()?;
        warn!("Cleared all rows from the user database");
        Ok(())
    }

    /// Create the dirty flag so the next open clears the database.
    pub fn mark_dirty(&self) {
        if self.dirty_flag.as_os_str().is_empty() {
            return;
        }
        if let Err(e) = fs::write(&self.dirty_flag, b"") {
            warn!(
                "Failed to create dirty flag at {}: {e}",
                self.dirty_flag.display()
            );
        }
    }

    /// Remove the dirty flag after a successful rebuild.
    pub fn remove_dirty_flag(&self) {
        if self.dirty_flag.as_os_str().is_empty() || !self.dirty_flag.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.dirty_flag) {
            warn!(
                "Failed to remove dirty flag at {}: {e}",
                self.dirty_flag.display()
            );
        }
    }

    /// Whether the dirty flag currently exists on disk.
    pub fn is_dirty(&self) -> bool {
        !self.dirty_flag.as_os_str().is_empty() && self.dirty_flag.exists()
    }
}

fn remove_db_files(db_path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let path = PathBuf::from(format!("{}{suffix}", db_path.display()));
        if path.exists() {
            fs::remove_file(&path).map_err(|e| Error::DatabaseSetup {
                path: path.clone(),
                source: e,
            })?;
        }
    }
    Ok(())
}
