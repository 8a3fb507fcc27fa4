//! Self-describing base64 data URIs, the image encoding used on the wire.
//!
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

/// MIME type of encoded camera frames.
pub const JPEG_MIME: &str = "image/jpeg";

#[derive(Debug, Error, Eq, PartialEq)]
pub enum DataUriError {
    #[error("missing `data:` scheme")]
    MissingScheme,
    #[error("malformed data URI header")]
    MalformedHeader,
    #[error("invalid base64 payload")]
    InvalidBase64,
}

/// Encode raw bytes as `data:<mime>;base64,<payload>`.
pub fn encode(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

/// Split a data URI into its MIME type and decoded payload.
pub fn decode(uri: &str) -> Result<(String, Vec<u8>), DataUriError> {
    let rest = uri.strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
    let (header, payload) = rest.split_once(',').ok_or(DataUriError::MalformedHeader)?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or(DataUriError::MalformedHeader)?;
    let data = STANDARD
        .decode(payload)
        .map_err(|_| DataUriError::InvalidBase64)?;
    Ok((mime.to_owned(), data))
}
