//! SQLite-backed key-value store
//!
//! One row per document in a `preferences` table. Uses parameterized queries
//! exclusively.

use super::{Backend, BackendKind, Document};
use crate::error::{InventoryError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Structured preference-style store
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the store at `path`, creating parent directories as needed
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
                log::info!("Created directory: {}", parent.display());
            }
        }
        let conn = Connection::open(path)?;
        log::info!("Opened key-value store: {}", path.display());
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| InventoryError::Persistence {
            document: "preferences",
            reason: "key-value store lock poisoned".to_string(),
        })
    }
}

/// Creates the `preferences` table if it does not already exist
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS preferences (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
}

impl Backend for SqliteKvStore {
    fn kind(&self) -> BackendKind {
        BackendKind::KeyValue
    }

    fn read(&self, document: Document) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![document.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, document: Document, content: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET
                value      = excluded.value,
                updated_at = excluded.updated_at",
            params![document.key(), content],
        )?;
        log::debug!("Saved {} to key-value store ({} bytes)", document, content.len());
        Ok(())
    }
}
