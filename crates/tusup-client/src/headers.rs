//! Caller-supplied request headers

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::UploadError;

/// Headers the protocol sets itself; callers may not override them.
pub const RESERVED_HEADERS: [&str; 5] = [
    "Upload-Offset",
    "Upload-Length",
    "Tus-Resumable",
    "Upload-Defer-Length",
    "Upload-Metadata",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Parse one `Name: Value` line.
pub fn parse_header(line: &str) -> Result<(HeaderName, HeaderValue), UploadError> {
    let (name, value) = line.split_once(':').ok_or_else(|| {
        UploadError::Config(format!(
            "header {line:?} is not of the form \"Name: Value\""
        ))
    })?;
    let name = name.trim();
    if name.is_empty() {
        return Err(UploadError::Config(format!("header {line:?} has no name")));
    }
    if is_reserved(name) {
        return Err(UploadError::Config(format!(
            "the {name} header is managed by the tus protocol"
        )));
    }

    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| UploadError::Config(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| UploadError::Config(format!("invalid value for header {name}: {e}")))?;
    Ok((name, value))
}

/// Parse every line; repeated names keep all their values.
pub fn parse_headers<I, S>(lines: I) -> Result<HeaderMap, UploadError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for line in lines {
        let (name, value) = parse_header(line.as_ref())?;
        headers.append(name, value);
    }
    Ok(headers)
}

/// Reject a header map that tries to set a protocol header.
pub fn check_reserved(headers: &HeaderMap) -> Result<(), UploadError> {
    match headers.keys().find(|name| is_reserved(name.as_str())) {
        Some(name) => Err(UploadError::Config(format!(
            "the {name} header is managed by the tus protocol"
        ))),
        None => Ok(()),
    }
}
