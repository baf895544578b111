//! tusup-store: resume state for interrupted uploads
//!
//! Maps a local file fingerprint to the tus upload URL the server issued
//! for it, so a later run can continue the same remote upload. Three
//! interchangeable backends share the [`Store`] contract:
//!
//! - [`KvStore`]: single redb file, one `resume` table of raw bytes
//! - [`JsonStore`]: one JSON object, rewritten atomically on each change
//! - [`SqliteStore`]: `fingerprints(fingerprint PRIMARY KEY, url)` table

pub mod json;
pub mod kv;
pub mod sqlite;
pub mod store;

pub use json::JsonStore;
pub use kv::KvStore;
pub use sqlite::SqliteStore;
pub use store::{Store, StoreKind};
