//! Terminal errors of an upload run

use std::fmt;

use crate::protocol::ProtocolError;

/// Why an upload did not reach the full offset.
///
/// Stale resume entries never surface here: they are discarded and a new
/// upload is created instead.
#[derive(Debug)]
pub enum UploadError {
    /// Rejected before any network activity (chunk size, headers, ...)
    Config(String),
    /// Local file could not be opened or read
    Io(std::io::Error),
    /// Resume store could not be written
    Store(anyhow::Error),
    /// Server rejected a request, or the request never got an answer
    Protocol(ProtocolError),
    /// Stopped between chunks on request; the store entry is kept
    Cancelled { offset: u64, total: u64 },
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Store(e) => write!(f, "resume store: {e:#}"),
            Self::Protocol(e) => write!(f, "{e}"),
            Self::Cancelled { offset, total } => {
                write!(f, "upload cancelled after {offset} of {total} bytes")
            }
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Store(e) => Some(&**e),
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ProtocolError> for UploadError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

impl UploadError {
    /// Whether a later run can pick up where this one stopped.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_config() {
        let err = UploadError::Config("chunk size 0 is below the minimum of 1".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: chunk size 0 is below the minimum of 1"
        );
    }

    #[test]
    fn display_cancelled() {
        let err = UploadError::Cancelled {
            offset: 1024,
            total: 2500,
        };
        assert_eq!(err.to_string(), "upload cancelled after 1024 of 2500 bytes");
    }

    #[test]
    fn io_converts() {
        let err: UploadError = std::io::Error::other("disk gone").into();
        assert!(matches!(err, UploadError::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn resumable_kinds() {
        assert!(UploadError::Protocol(ProtocolError::OffsetMismatch).is_resumable());
        assert!(UploadError::Cancelled { offset: 1, total: 2 }.is_resumable());
        assert!(!UploadError::Config("x".into()).is_resumable());
        assert!(!UploadError::Io(std::io::Error::other("x")).is_resumable());
    }
}
