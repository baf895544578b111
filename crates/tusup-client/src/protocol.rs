//! tus 1.0.0 requests: CREATE (POST), status (HEAD) and chunk append (PATCH)
//!
//! The engine only talks to [`Transport`]; [`HttpTransport`] is the real
//! implementation on top of the shared reqwest client. Requests are async
//! internally and driven to completion with [`tusup_core::block_on`].

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::{Method, StatusCode, Url};

use tusup_core::{block_on, http_client};

/// Protocol version sent in `Tus-Resumable` with every request
pub const TUS_VERSION: &str = "1.0.0";

pub const TUS_RESUMABLE: &str = "Tus-Resumable";
pub const UPLOAD_OFFSET: &str = "Upload-Offset";
pub const UPLOAD_LENGTH: &str = "Upload-Length";
pub const UPLOAD_METADATA: &str = "Upload-Metadata";

const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

/// Longest slice of a response body kept in error messages
const BODY_SNIPPET: usize = 200;

/// Upload metadata, sent as `Upload-Metadata` on CREATE
pub type Metadata = BTreeMap<String, String>;

#[derive(Debug)]
pub enum ProtocolError {
    /// Unexpected status, or no response at all (`status: None`)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Upload URL is gone (403, 404 or 410)
    NotFound { status: u16 },
    /// 409: server offset differs from the one we sent
    OffsetMismatch,
    /// 412: server does not speak our `Tus-Resumable` version
    VersionMismatch,
    /// 413: upload exceeds the server's maximum size
    TooLarge,
    MissingHeader(&'static str),
    InvalidHeader { name: &'static str, value: String },
    /// Acknowledged offset is behind what was sent or beyond the total
    InvalidOffset { sent: u64, acked: u64 },
    /// Server accepted a chunk but the offset did not move
    Stalled { offset: u64 },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::NotFound { status } => write!(f, "upload not found on server (HTTP {status})"),
            Self::OffsetMismatch => write!(f, "server offset does not match (HTTP 409)"),
            Self::VersionMismatch => {
                write!(f, "server does not support tus {TUS_VERSION} (HTTP 412)")
            }
            Self::TooLarge => write!(f, "upload exceeds the server's maximum size (HTTP 413)"),
            Self::MissingHeader(name) => write!(f, "response is missing the {name} header"),
            Self::InvalidHeader { name, value } => {
                write!(f, "response has an invalid {name} header: {value:?}")
            }
            Self::InvalidOffset { sent, acked } => write!(
                f,
                "server acknowledged offset {acked} after a chunk sent at {sent}"
            ),
            Self::Stalled { offset } => {
                write!(f, "server accepted a chunk but stayed at offset {offset}")
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create from a reqwest error (connection, timeout, body read, ...)
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a status request failing this way means the recorded
    /// upload is gone or unusable. Auth, rate-limit and server errors say
    /// nothing about the upload and leave it alone.
    pub fn is_stale_location(&self) -> bool {
        self.is_not_found()
            || matches!(self, Self::MissingHeader(_) | Self::InvalidHeader { .. })
    }

    /// Map a non-success status shared by all three requests.
    fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            403 | 404 | 410 => Self::NotFound {
                status: status.as_u16(),
            },
            409 => Self::OffsetMismatch,
            412 => Self::VersionMismatch,
            413 => Self::TooLarge,
            s => {
                let reason = status.canonical_reason().unwrap_or("unexpected status");
                let body = body.trim();
                let message = if body.is_empty() {
                    reason.to_string()
                } else {
                    let snippet: String = body.chars().take(BODY_SNIPPET).collect();
                    format!("{reason}: {snippet}")
                };
                Self::Http {
                    status: Some(s),
                    message,
                }
            }
        }
    }
}

/// What HEAD reports about an upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Bytes the server has stored
    pub offset: u64,
    /// Declared total, when the server reports it
    pub length: Option<u64>,
}

/// The three tus requests the engine needs.
pub trait Transport {
    /// POST to `url`; returns the absolute upload URL.
    fn create(&self, url: &str, total_size: u64, metadata: &Metadata)
    -> Result<String, ProtocolError>;

    /// HEAD the upload.
    fn status(&self, location: &str) -> Result<RemoteStatus, ProtocolError>;

    /// PATCH `chunk` at `offset`; returns the offset the server acknowledged.
    fn patch(&self, location: &str, offset: u64, chunk: &[u8]) -> Result<u64, ProtocolError>;
}

/// `key base64(value)` pairs joined by commas. Empty keys are skipped.
pub fn encode_metadata(metadata: &Metadata) -> String {
    metadata
        .iter()
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{k} {}", STANDARD.encode(v))
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// [`Transport`] over the shared HTTP client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    headers: HeaderMap,
}

impl HttpTransport {
    /// `headers` are added to every request. Reserved tus headers must
    /// already have been rejected by config validation.
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        http_client()
            .request(method, url)
            .headers(self.headers.clone())
            .header(TUS_RESUMABLE, TUS_VERSION)
    }
}

/// Read the body of a failed response for the error message.
async fn rejection(response: reqwest::Response) -> ProtocolError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ProtocolError::from_status(status, &body)
}

fn parse_u64(headers: &HeaderMap, name: &'static str) -> Result<Option<u64>, ProtocolError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| ProtocolError::InvalidHeader {
            name,
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
}

fn require_u64(headers: &HeaderMap, name: &'static str) -> Result<u64, ProtocolError> {
    parse_u64(headers, name)?.ok_or(ProtocolError::MissingHeader(name))
}

/// Resolve a `Location` header against the creation URL.
fn resolve_location(base: &str, location: &str) -> Result<String, ProtocolError> {
    let invalid = || ProtocolError::InvalidHeader {
        name: "Location",
        value: location.to_string(),
    };
    let base = Url::parse(base).map_err(|_| invalid())?;
    base.join(location).map(String::from).map_err(|_| invalid())
}

impl Transport for HttpTransport {
    fn create(
        &self,
        url: &str,
        total_size: u64,
        metadata: &Metadata,
    ) -> Result<String, ProtocolError> {
        let mut request = self
            .request(Method::POST, url)
            .header(UPLOAD_LENGTH, total_size)
            .header(CONTENT_LENGTH, 0);
        let encoded = encode_metadata(metadata);
        if !encoded.is_empty() {
            request = request.header(UPLOAD_METADATA, encoded);
        }

        block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| ProtocolError::from_reqwest(&e))?;
            if response.status() != StatusCode::CREATED {
                return Err(rejection(response).await);
            }
            let location = response
                .headers()
                .get(LOCATION)
                .ok_or(ProtocolError::MissingHeader("Location"))?;
            let location = location
                .to_str()
                .map_err(|_| ProtocolError::InvalidHeader {
                    name: "Location",
                    value: String::from_utf8_lossy(location.as_bytes()).into_owned(),
                })?;
            resolve_location(url, location)
        })
    }

    fn status(&self, location: &str) -> Result<RemoteStatus, ProtocolError> {
        let request = self.request(Method::HEAD, location);
        block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| ProtocolError::from_reqwest(&e))?;
            if !matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) {
                return Err(rejection(response).await);
            }
            let headers = response.headers();
            Ok(RemoteStatus {
                offset: require_u64(headers, UPLOAD_OFFSET)?,
                length: parse_u64(headers, UPLOAD_LENGTH)?,
            })
        })
    }

    fn patch(&self, location: &str, offset: u64, chunk: &[u8]) -> Result<u64, ProtocolError> {
        let request = self
            .request(Method::PATCH, location)
            .header(CONTENT_TYPE, OFFSET_OCTET_STREAM)
            .header(UPLOAD_OFFSET, offset)
            .body(chunk.to_vec());
        block_on(async {
            let response = request
                .send()
                .await
                .map_err(|e| ProtocolError::from_reqwest(&e))?;
            if !matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) {
                return Err(rejection(response).await);
            }
            require_u64(response.headers(), UPLOAD_OFFSET)
        })
    }
}
