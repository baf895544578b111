//! Chunked transfer engine
//!
//! Strictly sequential: a chunk is read and sent only after the previous
//! one was acknowledged, and the offset the server acknowledges replaces
//! the local one. Nothing is retried here; any failure ends the run and
//! leaves the resume entry for the next invocation.

use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};

use indicatif::ProgressBar;
use log::{debug, warn};
use tusup_store::Store;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::protocol::{ProtocolError, Transport};
use crate::session::{self, Origin, SessionState, Upload};

/// Receives offset updates while an upload runs.
pub trait ProgressObserver {
    /// Called once before the first chunk, with the starting offset.
    fn start(&mut self, offset: u64, total: u64);
    /// Called after every acknowledged chunk.
    fn advance(&mut self, offset: u64);
    /// Called once the remote offset reaches the total.
    fn finish(&mut self);
}

impl ProgressObserver for ProgressBar {
    fn start(&mut self, offset: u64, total: u64) {
        self.set_length(total);
        self.set_position(offset);
    }

    fn advance(&mut self, offset: u64) {
        self.set_position(offset);
    }

    fn finish(&mut self) {
        ProgressBar::finish(self);
    }
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn start(&mut self, _: u64, _: u64) {}
    fn advance(&mut self, _: u64) {}
    fn finish(&mut self) {}
}

/// Per-run view of the remote upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadState {
    pub total_size: u64,
    /// Last offset acknowledged by the server
    pub remote_offset: u64,
    pub chunk_size: u64,
    pub location: String,
}

impl UploadState {
    pub fn is_complete(&self) -> bool {
        self.remote_offset == self.total_size
    }
}

/// Drives one upload from its resolved offset to the total size.
pub struct Uploader<'a, T: ?Sized, R> {
    transport: &'a T,
    store: Option<&'a dyn Store>,
    upload: Upload<R>,
    state: UploadState,
    session_state: SessionState,
    origin: Origin,
    chunks_sent: u64,
    bytes_sent: u64,
}

impl<'a, T, R> Uploader<'a, T, R>
where
    T: Transport + ?Sized,
    R: Read + Seek,
{
    /// Resolve the remote upload (resume or create) and get ready to send.
    ///
    /// `config` must already be validated. Passing `None` as the store
    /// disables resumption entirely.
    pub fn new(
        transport: &'a T,
        store: Option<&'a dyn Store>,
        url: &str,
        upload: Upload<R>,
        config: &UploadConfig,
    ) -> Result<Self, UploadError> {
        let mut uploader = Self {
            transport,
            store,
            state: UploadState {
                total_size: upload.size(),
                remote_offset: 0,
                chunk_size: config.chunk_size,
                location: String::new(),
            },
            upload,
            session_state: SessionState::Uninitialized,
            origin: Origin::Created,
            chunks_sent: 0,
            bytes_sent: 0,
        };

        uploader.session_state = SessionState::Resolving;
        let session = session::resolve(transport, store, url, &uploader.upload)?;
        uploader.state.location = session.location;
        uploader.state.remote_offset = session.offset;
        uploader.origin = session.origin;
        uploader.session_state = SessionState::Active;
        uploader.settle();
        Ok(uploader)
    }

    pub fn state(&self) -> &UploadState {
        &self.state
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_finished(&self) -> bool {
        self.session_state == SessionState::Finished
    }

    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Send the next chunk and apply the acknowledged offset.
    ///
    /// Returns the new offset. A finished upload sends nothing.
    pub fn upload_chunk(&mut self) -> Result<u64, UploadError> {
        if self.is_finished() {
            return Ok(self.state.remote_offset);
        }

        let offset = self.state.remote_offset;
        let total = self.state.total_size;
        // chunk_size fits in usize after validation, so the min does too
        let len = self.state.chunk_size.min(total - offset) as usize;
        let chunk = self.upload.read_chunk(offset, len)?;

        debug!("PATCH {} at {offset} ({len} bytes)", self.state.location);
        let acked = self.transport.patch(&self.state.location, offset, &chunk)?;
        if acked < offset || acked > total {
            return Err(ProtocolError::InvalidOffset {
                sent: offset,
                acked,
            }
            .into());
        }
        if acked == offset {
            return Err(ProtocolError::Stalled { offset }.into());
        }

        self.chunks_sent += 1;
        self.bytes_sent += acked - offset;
        self.state.remote_offset = acked;
        self.settle();
        Ok(acked)
    }

    /// Send chunks until the upload is complete.
    ///
    /// `cancel` is checked before each chunk; a chunk in flight always
    /// finishes. On any error the state keeps the last acknowledged
    /// offset and the store entry stays in place.
    pub fn run(
        &mut self,
        observer: &mut dyn ProgressObserver,
        cancel: &AtomicBool,
    ) -> Result<(), UploadError> {
        observer.start(self.state.remote_offset, self.state.total_size);
        while !self.is_finished() {
            if cancel.load(Ordering::Relaxed) {
                return Err(UploadError::Cancelled {
                    offset: self.state.remote_offset,
                    total: self.state.total_size,
                });
            }
            let offset = self.upload_chunk()?;
            observer.advance(offset);
        }
        observer.finish();
        Ok(())
    }

    /// Move to `Finished` once the offset reaches the total, releasing the
    /// store entry. Failing to delete it only leaves an orphan behind.
    fn settle(&mut self) {
        if self.session_state != SessionState::Active || !self.state.is_complete() {
            return;
        }
        self.session_state = SessionState::Finished;
        if let Some(store) = self.store {
            if let Err(e) = store.delete(self.upload.fingerprint()) {
                warn!("Failed to remove resume entry: {e:#}");
            }
        }
    }
}
