//! Best-effort MIME detection for building image data URIs.
//!
//! Unlike the validator, detection never fails: ambiguous input falls back to
//! `image/jpeg` so a request can always be built.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::trace;

use super::ImageFormat;

/// MIME type used when the format cannot be determined.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Shortest payload worth sniffing.
const MIN_SNIFF_CHARS: usize = 20;

/// Base64 characters decoded for sniffing (12 bytes).
const SNIFF_CHARS: usize = 16;

/// Infer the MIME type of a base64 image payload.
pub fn detect_mime_type(data: &str) -> &'static str {
    let payload = strip_data_uri(data);
    if payload.len() < MIN_SNIFF_CHARS || !payload.is_char_boundary(SNIFF_CHARS) {
        return DEFAULT_MIME_TYPE;
    }

    match STANDARD.decode(&payload[..SNIFF_CHARS]) {
        Ok(decoded) => detect_mime_type_from_bytes(&decoded),
        Err(e) => {
            trace!("Base64 prefix did not decode, assuming JPEG: {}", e);
            DEFAULT_MIME_TYPE
        }
    }
}

/// Infer the MIME type of raw image bytes.
pub fn detect_mime_type_from_bytes(bytes: &[u8]) -> &'static str {
    if bytes.len() < 4 {
        return DEFAULT_MIME_TYPE;
    }
    ImageFormat::sniff(bytes)
        .map(|format| format.mime_type())
        .unwrap_or(DEFAULT_MIME_TYPE)
}

/// Standard base64 encoding of raw bytes.
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap a base64 payload in a `data:` URI. An empty MIME type means JPEG.
pub fn to_data_uri(data: &str, mime_type: &str) -> String {
    let mime_type = if mime_type.is_empty() { DEFAULT_MIME_TYPE } else { mime_type };
    format!("data:{mime_type};base64,{data}")
}

/// Whether the string already carries a `data:` URI header.
pub fn is_data_uri(data: &str) -> bool {
    data.len() > 5 && data.starts_with("data:")
}

/// The encoded payload of a `data:` URI, or the input unchanged.
pub(crate) fn strip_data_uri(data: &str) -> &str {
    if !is_data_uri(data) {
        return data;
    }
    match data.find(',') {
        Some(idx) => &data[idx + 1..],
        None => data,
    }
}
