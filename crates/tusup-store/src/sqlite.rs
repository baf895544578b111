//! SQLite-backed store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required. The connection sits behind a `Mutex`; each
//! statement runs in SQLite's implicit transaction.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::Store;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and create the table.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open sqlite store {}", path.display()))?;
        Self::init(conn)
    }

    /// Private in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS fingerprints (
                fingerprint TEXT PRIMARY KEY,
                url         TEXT
            );
            ",
        )
        .context("failed to initialize sqlite store")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lookup(&self, fingerprint: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.query_row(
            "SELECT url FROM fingerprints WHERE fingerprint = ?1",
            params![fingerprint],
            |row| row.get(0),
        )
        .optional()
    }
}

impl Store for SqliteStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        self.lookup(fingerprint).unwrap_or_else(|e| {
            log::warn!("sqlite store read failed for {fingerprint}: {e}");
            None
        })
    }

    fn set(&self, fingerprint: &str, url: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT INTO fingerprints (fingerprint, url) VALUES (?1, ?2)
             ON CONFLICT (fingerprint) DO UPDATE SET url = excluded.url",
            params![fingerprint, url],
        )
        .with_context(|| format!("failed to store resume URL for {fingerprint}"))?;
        Ok(())
    }

    fn delete(&self, fingerprint: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "DELETE FROM fingerprints WHERE fingerprint = ?1",
            params![fingerprint],
        )?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt =
            conn.prepare("SELECT fingerprint, url FROM fingerprints ORDER BY fingerprint")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get::<_, Option<String>>(1)?.unwrap_or_default()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_single_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("fp", "https://host/a").unwrap();
        store.set("fp", "https://host/b").unwrap();
        assert_eq!(store.get("fp").as_deref(), Some("https://host/b"));
        assert_eq!(store.entries().unwrap().len(), 1);
    }

    #[test]
    fn schema_matches_expected_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        let mut stmt = conn.prepare("PRAGMA table_info(fingerprints)").unwrap();
        let cols: Vec<(String, String, i64)> = stmt
            .query_map([], |row| Ok((row.get(1)?, row.get(2)?, row.get(5)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            cols,
            vec![
                ("fingerprint".to_string(), "TEXT".to_string(), 1),
                ("url".to_string(), "TEXT".to_string(), 0),
            ]
        );
    }

    #[test]
    fn reads_rows_written_by_other_clients() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE fingerprints(fingerprint TEXT PRIMARY KEY, url TEXT);
                 INSERT INTO fingerprints VALUES ('fp-go', 'https://host/files/go');",
            )
            .unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("fp-go").as_deref(), Some("https://host/files/go"));
    }

    #[test]
    fn broken_table_reads_as_miss() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE fingerprints")
            .unwrap();
        assert_eq!(store.get("fp"), None);
        assert!(store.set("fp", "https://host/u").is_err());
    }
}
