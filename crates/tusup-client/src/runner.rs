//! One-call upload: validate, resolve, transfer, summarize

use std::io::{Read, Seek};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use tusup_store::Store;

use crate::config::UploadConfig;
use crate::engine::{ProgressObserver, Uploader};
use crate::error::UploadError;
use crate::protocol::Transport;
use crate::session::{Origin, Upload};

/// Outcome of a completed upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSummary {
    /// Final upload URL
    pub location: String,
    pub total_size: u64,
    /// Offset the run resumed from, if it resumed at all
    pub resumed_from: Option<u64>,
    pub chunks_sent: u64,
    /// Bytes acknowledged during this run
    pub bytes_sent: u64,
}

/// Upload the file at `path` to the tus endpoint `url`.
///
/// The store is only consulted when `config.resume` is set. Nothing is
/// sent unless `config` validates and the file can be opened.
pub fn upload_file<T>(
    url: &str,
    path: &Path,
    config: &UploadConfig,
    transport: &T,
    store: Option<&dyn Store>,
    observer: &mut dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<UploadSummary, UploadError>
where
    T: Transport + ?Sized,
{
    config.validate()?;
    let source = Upload::from_path(path)?;
    upload(url, source, config, transport, store, observer, cancel)
}

/// Upload any seekable source.
pub fn upload<T, R>(
    url: &str,
    source: Upload<R>,
    config: &UploadConfig,
    transport: &T,
    store: Option<&dyn Store>,
    observer: &mut dyn ProgressObserver,
    cancel: &AtomicBool,
) -> Result<UploadSummary, UploadError>
where
    T: Transport + ?Sized,
    R: Read + Seek,
{
    config.validate()?;
    let store = store.filter(|_| config.resume);

    let mut uploader = Uploader::new(transport, store, url, source, config)?;
    // returns Ok only once the remote offset reached the total
    uploader.run(observer, cancel)?;

    let state = uploader.state();
    Ok(UploadSummary {
        location: state.location.clone(),
        total_size: state.total_size,
        resumed_from: match uploader.origin() {
            Origin::Resumed { offset } => Some(offset),
            Origin::Created => None,
        },
        chunks_sent: uploader.chunks_sent(),
        bytes_sent: uploader.bytes_sent(),
    })
}
