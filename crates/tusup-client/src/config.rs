//! Upload settings and the defaults they start from

use reqwest::header::HeaderMap;

use crate::error::UploadError;
use crate::headers;

/// Chunk size when none is configured: 2 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Smallest chunk the client will send. tus itself imposes no floor;
/// servers backed by object storage usually need 5 MiB and should raise
/// `min_chunk_size` accordingly.
pub const MIN_CHUNK_SIZE: u64 = 1;

/// Everything the engine needs besides the file, the URL and the store.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub chunk_size: u64,
    pub min_chunk_size: u64,
    /// Consult and update the resume store
    pub resume: bool,
    /// Extra headers sent with every request
    pub headers: HeaderMap,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_chunk_size: MIN_CHUNK_SIZE,
            resume: true,
            headers: HeaderMap::new(),
        }
    }
}

impl UploadConfig {
    /// Reject settings that would fail later, before touching the network.
    pub fn validate(&self) -> Result<(), UploadError> {
        let floor = self.min_chunk_size.max(MIN_CHUNK_SIZE);
        if self.chunk_size < floor {
            return Err(UploadError::Config(format!(
                "chunk size {} is below the minimum of {floor}",
                self.chunk_size
            )));
        }
        if usize::try_from(self.chunk_size).is_err() {
            return Err(UploadError::Config(format!(
                "chunk size {} does not fit in memory on this platform",
                self.chunk_size
            )));
        }
        headers::check_reserved(&self.headers)
    }
}
