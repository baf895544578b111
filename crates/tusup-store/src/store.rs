//! The store contract and backend selection

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::{JsonStore, KvStore, SqliteStore};

/// Persistent `fingerprint -> upload URL` mapping.
///
/// A store is opened once per process, owned by a single upload and
/// closed before exit. Implementations use interior locking so every
/// operation takes `&self`.
pub trait Store: Send + Sync {
    /// Look up the upload URL recorded for `fingerprint`.
    ///
    /// Never fails: read errors are logged and reported as a miss, so a
    /// damaged store degrades to a fresh upload instead of aborting.
    fn get(&self, fingerprint: &str) -> Option<String>;

    /// Insert or replace the mapping. Durable once this returns.
    fn set(&self, fingerprint: &str, url: &str) -> Result<()>;

    /// Remove the mapping. Removing an absent key is a no-op.
    fn delete(&self, fingerprint: &str) -> Result<()>;

    /// All mappings, sorted by fingerprint.
    fn entries(&self) -> Result<Vec<(String, String)>>;

    /// Flush and release the backing file or connection.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Which backend to use, as chosen on the command line or in config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Resumption disabled, nothing persisted
    None,
    /// Pick by file extension
    Auto,
    /// redb key-value file
    Kv,
    Json,
    #[default]
    Sqlite,
}

impl StoreKind {
    /// Resolve `Auto` from the extension of `path`.
    ///
    /// `.redb`/`.kv`/`.bdb` -> key-value, `.db`/`.sqlite` -> SQLite, `.json` -> JSON.
    pub fn resolve(self, path: &Path) -> Result<Self> {
        if self != Self::Auto {
            return Ok(self);
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("redb" | "kv" | "bdb") => Ok(Self::Kv),
            Some("db" | "sqlite") => Ok(Self::Sqlite),
            Some("json") => Ok(Self::Json),
            _ => bail!(
                "cannot pick a store type for {}: use a .redb, .db or .json file, or set the type explicitly",
                path.display()
            ),
        }
    }

    /// Open (creating if absent) the store at `path`.
    ///
    /// Returns `None` for [`StoreKind::None`].
    pub fn open(self, path: &Path) -> Result<Option<Box<dyn Store>>> {
        let kind = self.resolve(path)?;
        if kind == Self::None {
            return Ok(None);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir: {}", parent.display()))?;
        }

        let store: Box<dyn Store> = match kind {
            Self::Kv => Box::new(KvStore::open(path)?),
            Self::Json => Box::new(JsonStore::open(path)?),
            Self::Sqlite => Box::new(SqliteStore::open(path)?),
            Self::None | Self::Auto => unreachable!("resolved above"),
        };
        log::debug!("opened {kind} store at {}", path.display());
        Ok(Some(store))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Auto => "auto",
            Self::Kv => "kv",
            Self::Json => "json",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "none" => Ok(Self::None),
            "auto" => Ok(Self::Auto),
            "kv" => Ok(Self::Kv),
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            _ => bail!(r#"must be one of "none", "auto", "kv", "json" or "sqlite""#),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn auto_resolves_by_extension() {
        let cases = [
            ("resume.redb", StoreKind::Kv),
            ("resume.kv", StoreKind::Kv),
            ("resume.bdb", StoreKind::Kv),
            ("resume.db", StoreKind::Sqlite),
            ("resume.SQLITE", StoreKind::Sqlite),
            ("resume.json", StoreKind::Json),
        ];
        for (name, want) in cases {
            assert_eq!(
                StoreKind::Auto.resolve(&PathBuf::from(name)).unwrap(),
                want,
                "{name}"
            );
        }
    }

    #[test]
    fn auto_rejects_unknown_extension() {
        assert!(StoreKind::Auto.resolve(Path::new("resume.txt")).is_err());
        assert!(StoreKind::Auto.resolve(Path::new("resume")).is_err());
    }

    #[test]
    fn explicit_kind_ignores_extension() {
        assert_eq!(
            StoreKind::Json.resolve(Path::new("state.db")).unwrap(),
            StoreKind::Json
        );
    }

    #[test]
    fn none_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.db");
        assert!(StoreKind::None.open(&path).unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/resume.json");
        let store = StoreKind::Auto.open(&path).unwrap().unwrap();
        store.set("fp", "https://host/u").unwrap();
        store.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn parse_names() {
        assert_eq!("".parse::<StoreKind>().unwrap(), StoreKind::None);
        assert_eq!("sqlite".parse::<StoreKind>().unwrap(), StoreKind::Sqlite);
        assert_eq!("kv".parse::<StoreKind>().unwrap(), StoreKind::Kv);
        assert!("bolt".parse::<StoreKind>().is_err());
    }

    #[test]
    fn display_matches_parse() {
        for kind in [
            StoreKind::None,
            StoreKind::Auto,
            StoreKind::Kv,
            StoreKind::Json,
            StoreKind::Sqlite,
        ] {
            assert_eq!(kind.to_string().parse::<StoreKind>().unwrap(), kind);
        }
    }
}
