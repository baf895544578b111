//! Embedded key-value store (redb)
//!
//! One database file with a single `resume` table. Keys and values are the
//! raw bytes of the fingerprint and URL. Every `set`/`delete` is its own
//! committed write transaction; redb serializes writers internally.

use std::path::Path;

use anyhow::{Context, Result};
use redb::{Database, ReadableTable, TableDefinition};

use crate::Store;

const RESUME: TableDefinition<&[u8], &[u8]> = TableDefinition::new("resume");

pub struct KvStore {
    db: Database,
}

impl KvStore {
    /// Open or create the database and make sure the table exists.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)
            .with_context(|| format!("failed to open kv store {}", path.display()))?;

        let txn = db.begin_write()?;
        txn.open_table(RESUME)?;
        txn.commit()?;

        Ok(Self { db })
    }

    fn lookup(&self, fingerprint: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RESUME)?;
        let value = table.get(fingerprint.as_bytes())?;
        Ok(value.map(|v| String::from_utf8_lossy(v.value()).into_owned()))
    }
}

impl Store for KvStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        self.lookup(fingerprint).unwrap_or_else(|e| {
            log::warn!("kv store read failed for {fingerprint}: {e:#}");
            None
        })
    }

    fn set(&self, fingerprint: &str, url: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(RESUME)?;
            table.insert(fingerprint.as_bytes(), url.as_bytes())?;
        }
        txn.commit()
            .with_context(|| format!("failed to store resume URL for {fingerprint}"))?;
        Ok(())
    }

    fn delete(&self, fingerprint: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(RESUME)?;
            let old = table.remove(fingerprint.as_bytes())?;
            old.is_some()
        };
        if removed {
            txn.commit()?;
        } else {
            txn.abort()?;
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(RESUME)?;
        let mut out = Vec::new();
        for row in table.iter()? {
            let (k, v) = row?;
            out.push((
                String::from_utf8_lossy(k.value()).into_owned(),
                String::from_utf8_lossy(v.value()).into_owned(),
            ));
        }
        Ok(out)
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Every write is already committed; dropping the handle releases
        // the file lock.
        drop(self.db);
        Ok(())
    }
}
