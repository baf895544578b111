//! Flat-file JSON store
//!
//! The whole mapping lives in memory behind a read-write lock and is
//! written out as a single JSON object after every change. Writes go to a
//! temp file in the same directory which is then renamed over the target,
//! so a crash mid-write leaves the previous document intact.
//!
//! Safe for concurrent use within one process. Two processes sharing the
//! same file will overwrite each other's changes.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::Store;

pub struct JsonStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, String>>,
}

impl JsonStore {
    /// Load `path`, or create it holding `{}` if absent.
    ///
    /// A file that exists but does not parse is logged and replaced on the
    /// next write: losing stale resume state only costs a re-upload.
    pub fn open(path: &Path) -> Result<Self> {
        let map = match fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                log::warn!(
                    "ignoring unreadable resume store {}: {e}",
                    path.display()
                );
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read store {}", path.display()));
            }
        };

        let store = Self {
            path: path.to_path_buf(),
            map: RwLock::new(map),
        };
        if !path.exists() {
            store.save(&store.map.read().unwrap_or_else(PoisonError::into_inner))?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize `map` into a temp file next to the target, not yet renamed.
    fn write_temp(&self, map: &BTreeMap<String, String>) -> Result<NamedTempFile> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;

        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut writer, map)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    /// Atomically replace the store file with `map`.
    fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let tmp = self.write_temp(map)?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl Store for JsonStore {
    fn get(&self, fingerprint: &str) -> Option<String> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(fingerprint).cloned()
    }

    fn set(&self, fingerprint: &str, url: &str) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(fingerprint.to_string(), url.to_string());
        self.save(&map)
    }

    fn delete(&self, fingerprint: &str) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        if map.remove(fingerprint).is_none() {
            return Ok(());
        }
        self.save(&map)
    }

    fn entries(&self) -> Result<Vec<(String, String)>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        self.save(&map)
    }
}
