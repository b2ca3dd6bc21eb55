//! Embedded sqlite backend, the most durable tier.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::backend::{BackendError, StorageBackend};

/// Schema for the key-value table. WAL keeps concurrent readers cheap and
/// `synchronous = NORMAL` is durable enough for telemetry state.
const KV_SCHEMA_SQL: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    CREATE TABLE IF NOT EXISTS kv (
        key        TEXT PRIMARY KEY,
        value      TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );
";

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(KV_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(KV_SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl StorageBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn read(&self, key: &str) -> Result<Option<String>, BackendError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert_eq!(backend.read("label:abc").unwrap(), None);
        backend.write("label:abc", "MellowLynx0007").unwrap();
        assert_eq!(
            backend.read("label:abc").unwrap(),
            Some("MellowLynx0007".to_string())
        );
    }

    #[test]
    fn write_replaces_existing_value() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.write("k", "one").unwrap();
        backend.write("k", "two").unwrap();
        assert_eq!(backend.read("k").unwrap(), Some("two".to_string()));
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.sqlite");
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.write("variant:exp:fp", "control").unwrap();
        }
        let reopened = SqliteBackend::open(&path).unwrap();
        assert_eq!(
            reopened.read("variant:exp:fp").unwrap(),
            Some("control".to_string())
        );
    }
}
