//! Precondition checks applied before an image is sent for extraction.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::ImageFormat;
use super::mime::strip_data_uri;
use crate::error::ValidationFailure;

/// Largest accepted image payload (50 MiB).
pub const MAX_IMAGE_SIZE_BYTES: usize = 50 * 1024 * 1024;

/// Base64 characters decoded for format detection.
const FORMAT_PREFIX_CHARS: usize = 20;

const MIB: f64 = 1024.0 * 1024.0;

/// Result type for validation checks.
pub type Result<T> = std::result::Result<T, ValidationFailure>;

/// Reject empty or oversized image data.
pub fn validate_size(bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return Err(ValidationFailure::new("image_data", "image data is empty"));
    }
    check_limit(bytes.len(), "")
}

/// Reject data whose leading bytes are not a supported image signature.
pub fn validate_format(bytes: &[u8]) -> Result<()> {
    if bytes.len() < 4 {
        return Err(ValidationFailure::new(
            "image_format",
            "image data too short to determine format",
        ));
    }

    match ImageFormat::sniff(bytes) {
        Some(format) if format.is_supported() => Ok(()),
        _ => Err(ValidationFailure::new(
            "image_format",
            "unsupported image format; supported formats are PNG, JPEG, WEBP and non-animated GIF",
        )),
    }
}

/// Size check followed by format check.
pub fn validate(bytes: &[u8]) -> Result<()> {
    validate_size(bytes)?;
    validate_format(bytes)
}

/// Size check on a base64 payload without decoding it.
pub fn validate_size_from_base64(data: &str) -> Result<()> {
    if data.is_empty() {
        return Err(ValidationFailure::new("image_data", "base64 image data is empty"));
    }
    check_limit(estimate_decoded_len(data), "~")
}

/// Size check, then format check on the decoded leading bytes only.
pub fn validate_base64(data: &str) -> Result<()> {
    validate_size_from_base64(data)?;

    let payload = strip_data_uri(data);
    let prefix = &payload[..floor_char_boundary(payload, FORMAT_PREFIX_CHARS)];
    let decoded = STANDARD.decode(prefix).map_err(|e| {
        ValidationFailure::new("image_data", format!("invalid base64 encoding: {e}"))
    })?;

    validate_format(&decoded)
}

/// Decoded size of a base64 payload: `floor(len * 3 / 4) - padding`.
///
/// A `data:` URI header is skipped up to the first comma.
pub fn estimate_decoded_len(data: &str) -> usize {
    let payload = strip_data_uri(data);
    let padding = payload.bytes().rev().take(2).take_while(|&b| b == b'=').count();
    (payload.len() * 3 / 4).saturating_sub(padding)
}

/// Human-readable size relative to the limit.
pub fn image_size_info(bytes: &[u8]) -> String {
    let size = bytes.len() as f64;
    let limit = MAX_IMAGE_SIZE_BYTES as f64;
    format!(
        "Size: {:.2} MB / {:.0} MB ({:.1}% of limit)",
        size / MIB,
        limit / MIB,
        size / limit * 100.0
    )
}

/// Human-readable format name, or a marker for unknown data.
pub fn image_format_info(bytes: &[u8]) -> String {
    if bytes.len() < 4 {
        return "Unknown format".to_string();
    }
    match ImageFormat::sniff(bytes) {
        Some(format) if format.is_supported() => format.to_string(),
        Some(format) => format!("{format} (unsupported)"),
        None => "Unknown/Unsupported".to_string(),
    }
}

fn check_limit(size: usize, approx: &str) -> Result<()> {
    if size > MAX_IMAGE_SIZE_BYTES {
        return Err(ValidationFailure::new(
            "image_size",
            format!(
                "image size {approx}{size} bytes ({:.2} MB) exceeds limit of {MAX_IMAGE_SIZE_BYTES} bytes ({:.2} MB)",
                size as f64 / MIB,
                MAX_IMAGE_SIZE_BYTES as f64 / MIB,
            ),
        ));
    }
    Ok(())
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    fn with_header(header: &[u8], len: usize) -> Vec<u8> {
        let mut data = vec![0u8; len];
        data[..header.len()].copy_from_slice(header);
        data
    }

    #[test]
    fn test_validate_size() {
        assert_eq!(validate_size(&[]).unwrap_err().field, "image_data");
        assert!(validate_size(&[0u8; 1024]).is_ok());
        assert!(validate_size(&vec![0u8; MAX_IMAGE_SIZE_BYTES]).is_ok());

        let err = validate_size(&vec![0u8; MAX_IMAGE_SIZE_BYTES + 1]).unwrap_err();
        assert_eq!(err.field, "image_size");
        assert!(err.message.contains("52428801 bytes"));
        assert!(err.message.contains("50.00 MB"));
        assert!(err.message.contains("52428800 bytes"));
    }

    #[test]
    fn test_validate_format() {
        assert!(validate_format(&PNG).is_ok());
        assert!(validate_format(&[0xFF, 0xD8, 0xFF, 0xE0]).is_ok());
        assert!(validate_format(&[0x47, 0x49, 0x46, 0x38, 0x39, 0x61]).is_ok());
        assert!(validate_format(&[
            0x52, 0x49, 0x46, 0x46, 0x00, 0x00, 0x00, 0x00, 0x57, 0x45, 0x42, 0x50
        ])
        .is_ok());

        for rejected in [
            &[0x00, 0x01][..],
            &[0x42, 0x4D, 0x00, 0x00],
            &[0x00, 0x00, 0x00, 0x00],
            &[0x52, 0x49, 0x46, 0x46, 0x00, 0x00],
        ] {
            assert_eq!(validate_format(rejected).unwrap_err().field, "image_format");
        }
    }

    #[test]
    fn test_validate_at_and_over_limit() {
        let at_limit = with_header(&PNG, MAX_IMAGE_SIZE_BYTES);
        assert!(validate(&at_limit).is_ok());

        let over = with_header(&[0xFF, 0xD8, 0xFF], MAX_IMAGE_SIZE_BYTES + 1);
        assert_eq!(validate(&over).unwrap_err().field, "image_size");
    }

    #[test]
    fn test_validate_short_circuits_on_size() {
        assert_eq!(validate(&[]).unwrap_err().field, "image_data");
    }

    #[test]
    fn test_estimate_matches_raw_length() {
        for n in [1usize, 2, 3, 4, 5, 17, 1000, 13 * 1024] {
            let encoded = STANDARD.encode(vec![0xABu8; n]);
            assert_eq!(estimate_decoded_len(&encoded), n, "length {n}");
        }
    }

    #[test]
    fn test_estimate_skips_data_uri_header() {
        let encoded = STANDARD.encode([1u8, 2, 3, 4, 5]);
        let uri = format!("data:image/png;base64,{encoded}");
        assert_eq!(estimate_decoded_len(&uri), 5);
    }

    #[test]
    fn test_validate_size_from_base64() {
        assert_eq!(validate_size_from_base64("").unwrap_err().field, "image_data");

        // 4 chars per 3 bytes; one group past the limit
        let oversized = "A".repeat((MAX_IMAGE_SIZE_BYTES / 3 + 1) * 4);
        assert_eq!(validate_size_from_base64(&oversized).unwrap_err().field, "image_size");
    }

    #[test]
    fn test_validate_base64() {
        let png = STANDARD.encode(with_header(&PNG, 64));
        assert!(validate_base64(&png).is_ok());
        assert!(validate_base64(&format!("data:image/png;base64,{png}")).is_ok());

        let bmp = STANDARD.encode(with_header(&[0x42, 0x4D], 64));
        assert_eq!(validate_base64(&bmp).unwrap_err().field, "image_format");
    }

    #[test]
    fn test_validate_base64_reports_encoding_errors() {
        let err = validate_base64("!!!!not-base64-at-all!!!!").unwrap_err();
        assert_eq!(err.field, "image_data");
        assert!(err.message.starts_with("invalid base64 encoding"));
    }

    #[test]
    fn test_info_strings() {
        assert_eq!(image_format_info(&PNG), "PNG");
        assert_eq!(image_format_info(&[0x42, 0x4D, 0, 0]), "BMP (unsupported)");
        assert_eq!(image_format_info(&[1, 2]), "Unknown format");
        assert!(image_size_info(&[0u8; 1024]).starts_with("Size: 0.00 MB / 50 MB"));
    }
}
