//! SQLite storage for cached metadata and archived records.
//!
//! The schema is versioned through `PRAGMA user_version`; each entry of
//! [`MIGRATIONS`] brings the file up one version.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// `(version, sql)` pairs, applied in order to files below `version`
const MIGRATIONS: &[(i32, &str)] = &[(1, include_str!("../schema.sql"))];

/// Version a fully migrated file reports
pub const SCHEMA_VERSION: i32 = MIGRATIONS[MIGRATIONS.len() - 1].0;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the metadata database at `path`, creating and migrating it as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Opening metadata database");

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;

        // Scan tasks read while a sync commits.
        let journal: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("Failed to enable WAL journal")?;
        debug!(journal = %journal, "Journal mode set");
        conn.busy_timeout(Duration::from_secs(5))
            .context("Failed to set busy timeout")?;

        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Private database for tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let found: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    pub fn get_version(&self) -> Result<i32> {
        let version = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    pub fn set_version(&self, version: i32) -> Result<()> {
        self.conn.pragma_update(None, "user_version", version)?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<()> {
        let current = self.get_version()?;

        for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
            info!(from = current, to = version, "Migrating metadata database");
            let tx = self.conn.transaction()?;
            tx.execute_batch(sql)
                .with_context(|| format!("Failed to apply schema version {}", version))?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()?;
        }

        Ok(())
    }
}
