//! Stable identity of a local file, used as the resume store key.
//!
//! Built from the canonical path, the size and the modification time, all
//! read from a single `stat`. File contents are never hashed. Touching or
//! resizing the file changes the fingerprint, which orphans the old resume
//! entry instead of resuming against data the server never saw.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Fingerprint of the file at `path`.
pub fn fingerprint(path: &Path) -> io::Result<String> {
    let meta = fs::metadata(path)?;
    from_metadata(path, &meta)
}

/// Fingerprint from metadata already obtained for `path`.
pub fn from_metadata(path: &Path, meta: &fs::Metadata) -> io::Result<String> {
    let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    Ok(from_parts(&canonical, meta.len(), meta.modified()?))
}

/// `{path}-{size}-{secs}.{nanos}` with the mtime relative to the epoch.
pub fn from_parts(path: &Path, size: u64, modified: SystemTime) -> String {
    let mtime = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => format!("{}.{:09}", d.as_secs(), d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            format!("-{}.{:09}", d.as_secs(), d.subsec_nanos())
        }
    };
    format!("{}-{size}-{mtime}", path.display())
}
