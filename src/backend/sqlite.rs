use super::{StorageBackend, validate_key};
use crate::models::now_ms;
use eyre::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::path::Path;
use tracing::debug;

/// SQLite-backed storage: a single `kv` table
pub struct SqliteBackend {
    db: Connection,
}

impl SqliteBackend {
    /// Open or create a database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let db = Connection::open(path).context("Failed to open SQLite database")?;
        Self::from_connection(db)
    }

    /// Open a private, non-persistent database
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        Self::from_connection(db)
    }

    fn from_connection(db: Connection) -> Result<Self> {
        let backend = Self { db };
        backend.create_schema()?;
        Ok(backend)
    }

    /// Get a reference to the SQLite database connection
    pub fn db(&self) -> &Connection {
        &self.db
    }

    fn create_schema(&self) -> Result<()> {
        debug!("Creating database schema");

        self.db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(())
    }
}

impl StorageBackend for SqliteBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;

        let value = self
            .db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
            .with_context(|| format!("Failed to read key {}", key))?;

        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        validate_key(key)?;

        self.db
            .execute(
                "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, now_ms()],
            )
            .with_context(|| format!("Failed to write key {}", key))?;

        debug!(key, len = value.len(), "Wrote key to database");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_database() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("data").join("todostore.db");

        let _backend = SqliteBackend::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_get_missing_key() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert_eq!(backend.get("todo_list_items").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let backend = SqliteBackend::open_in_memory().unwrap();

        backend.set("k", b"first").unwrap();
        backend.set("k", b"second").unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"second".to_vec()));

        let rows: i64 = backend
            .db()
            .query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("todostore.db");
        {
            let backend = SqliteBackend::open(&db_path).unwrap();
            backend.set("k", b"[]").unwrap();
        }

        let backend = SqliteBackend::open(&db_path).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(b"[]".to_vec()));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.set("", b"x").is_err());
    }
}
