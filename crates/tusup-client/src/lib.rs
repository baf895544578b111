//! tusup client - resumable uploads over the tus 1.0.0 protocol
//!
//! [`session::resolve`] turns a local file into a remote upload, either
//! resuming one recorded in a [`Store`](tusup_store::Store) or creating a
//! fresh one. [`Uploader`] then sends the file chunk by chunk, trusting only
//! offsets acknowledged by the server. [`upload_file`] wires both together.

pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod headers;
pub mod protocol;
pub mod runner;
pub mod session;

#[cfg(test)]
mod testing;

pub use config::{DEFAULT_CHUNK_SIZE, MIN_CHUNK_SIZE, UploadConfig};
pub use engine::{NoProgress, ProgressObserver, UploadState, Uploader};
pub use error::UploadError;
pub use fingerprint::fingerprint;
pub use headers::{RESERVED_HEADERS, parse_headers};
pub use protocol::{HttpTransport, ProtocolError, RemoteStatus, TUS_VERSION, Transport};
pub use runner::{UploadSummary, upload, upload_file};
pub use session::{Origin, Session, SessionState, Upload};
