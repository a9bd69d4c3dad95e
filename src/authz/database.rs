//! SQLite-backed grant log.

use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use tracing::info;

use super::grant_log::{Grant, GrantLog, PersistenceError};

/// Grant log stored in an `authorized_groups` table.
pub struct SqliteGrantLog {
    conn: Mutex<Connection>,
}

impl SqliteGrantLog {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PersistenceError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let conn = Connection::open(path)?;
        let log = Self { conn: Mutex::new(conn) };
        log.init_schema()?;
        info!("Opened grant database at {:?}", path);
        Ok(log)
    }

    /// In-memory database, mainly for tests.
    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let log = Self { conn: Mutex::new(conn) };
        log.init_schema()?;
        Ok(log)
    }

    fn init_schema(&self) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS authorized_groups (
                group_id TEXT PRIMARY KEY,
                granted_by TEXT NOT NULL,
                granted_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }
}

impl GrantLog for SqliteGrantLog {
    fn append(&self, grant: &Grant) -> Result<(), PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        // The first grant for a group wins.
        conn.execute(
            "INSERT OR IGNORE INTO authorized_groups (group_id, granted_by, granted_at) VALUES (?1, ?2, ?3)",
            params![grant.group_id, grant.granted_by, grant.granted_at],
        )?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<String>, PersistenceError> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt =
            conn.prepare("SELECT group_id FROM authorized_groups ORDER BY granted_at, group_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let groups = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }
}
