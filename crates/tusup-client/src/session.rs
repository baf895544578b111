//! Upload source and remote session resolution
//!
//! [`resolve`] decides where the bytes go: an upload recorded in the store
//! whose remote offset still checks out, or a freshly created one.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use log::{debug, info, warn};
use tusup_store::Store;

use crate::error::UploadError;
use crate::fingerprint;
use crate::protocol::{Metadata, RemoteStatus, Transport};

/// A local byte source with a known size and a fingerprint.
pub struct Upload<R> {
    source: R,
    size: u64,
    fingerprint: String,
    metadata: Metadata,
}

impl Upload<File> {
    /// Open `path` read-only, stat it once for both size and fingerprint,
    /// and record its file name as upload metadata.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let fingerprint = fingerprint::from_metadata(path, &meta)?;
        let mut upload = Self::new(file, meta.len(), fingerprint);
        if let Some(name) = path.file_name() {
            upload = upload.with_metadata("filename", name.to_string_lossy());
        }
        Ok(upload)
    }
}

impl<R> Upload<R> {
    pub fn new(source: R, size: u64, fingerprint: impl Into<String>) -> Self {
        Self {
            source,
            size,
            fingerprint: fingerprint.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<R: Read + Seek> Upload<R> {
    /// Read exactly `len` bytes at `offset`.
    ///
    /// A source shorter than its recorded size (truncated after the stat)
    /// is an `UnexpectedEof` error, never a short chunk.
    pub fn read_chunk(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        self.source.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        (&mut self.source).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "source ended at {} bytes, expected {}",
                    offset + buf.len() as u64,
                    self.size
                ),
            ));
        }
        Ok(buf)
    }
}

/// Lifecycle of an upload session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Looking up the store, checking or creating the remote upload
    Resolving,
    /// Sending chunks
    Active,
    /// Remote offset reached the total size
    Finished,
}

/// How the remote upload was obtained
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Created,
    Resumed { offset: u64 },
}

/// A remote upload ready to receive bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub location: String,
    /// Offset the server reported when the session was resolved
    pub offset: u64,
    pub origin: Origin,
}

/// Resume the upload recorded for `upload` in `store`, or create a new one.
///
/// A recorded location the server no longer knows (403/404/410), or whose
/// status is malformed or inconsistent with the file, is stale: it is
/// removed from the store and a new upload is created in its place. Any
/// other status failure is returned and the entry is kept for a later run.
///
/// A newly created location is written to the store before this returns,
/// so it is durable before the first byte is sent.
pub fn resolve<T, R>(
    transport: &T,
    store: Option<&dyn Store>,
    url: &str,
    upload: &Upload<R>,
) -> Result<Session, UploadError>
where
    T: Transport + ?Sized,
{
    let fp = upload.fingerprint();

    if let Some(store) = store {
        if let Some(location) = store.get(fp) {
            debug!("found resume entry {fp} -> {location}");
            match transport.status(&location) {
                Ok(status) => match check_status(&status, upload.size()) {
                    Ok(()) => {
                        info!(
                            "Resuming {location} at {} of {} bytes",
                            status.offset,
                            upload.size()
                        );
                        return Ok(Session {
                            location,
                            offset: status.offset,
                            origin: Origin::Resumed {
                                offset: status.offset,
                            },
                        });
                    }
                    Err(reason) => warn!("Discarding resume entry for {location}: {reason}"),
                },
                Err(e) if e.is_stale_location() => {
                    warn!("Discarding resume entry for {location}: {e}");
                }
                Err(e) => return Err(e.into()),
            }
            if let Err(e) = store.delete(fp) {
                warn!("Failed to remove stale resume entry: {e:#}");
            }
        }
    }

    let location = transport.create(url, upload.size(), upload.metadata())?;
    info!("Created upload {location} ({} bytes)", upload.size());

    if let Some(store) = store {
        store.set(fp, &location).map_err(UploadError::Store)?;
        debug!("recorded resume entry {fp} -> {location}");
    }

    Ok(Session {
        location,
        offset: 0,
        origin: Origin::Created,
    })
}

/// Whether a HEAD response is consistent with the local file.
fn check_status(status: &RemoteStatus, size: u64) -> Result<(), String> {
    if let Some(length) = status.length {
        if length != size {
            return Err(format!("server length {length} differs from file size {size}"));
        }
    }
    if status.offset > size {
        return Err(format!(
            "server offset {} is beyond file size {size}",
            status.offset
        ));
    }
    Ok(())
}
