//! Image format sniffing, validation, and MIME detection.
//!
//! Formats are recognized from their leading magic bytes only; images are
//! never decoded.

pub mod mime;
pub mod validate;

pub use mime::{detect_mime_type, detect_mime_type_from_bytes, encode_base64, is_data_uri, to_data_uri};
pub use validate::{
    estimate_decoded_len, image_format_info, image_size_info, validate, validate_base64,
    validate_format, validate_size, validate_size_from_base64, MAX_IMAGE_SIZE_BYTES,
};

use std::fmt;

/// Image formats recognized by signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }

    /// Whether the vision endpoint accepts this format.
    pub fn is_supported(&self) -> bool {
        !matches!(self, ImageFormat::Bmp)
    }

    /// Identify the format from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        SIGNATURES
            .iter()
            .find(|sig| sig.matches(bytes))
            .map(|sig| sig.format)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Webp => "WEBP",
            ImageFormat::Bmp => "BMP",
        };
        f.write_str(name)
    }
}

/// A magic-byte signature: byte patterns that must appear at fixed offsets.
struct Signature {
    format: ImageFormat,
    min_len: usize,
    patterns: &'static [(usize, &'static [u8])],
}

impl Signature {
    fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() >= self.min_len
            && self
                .patterns
                .iter()
                .all(|(offset, magic)| bytes.get(*offset..offset + magic.len()) == Some(*magic))
    }
}

/// Checked in order; the first match wins.
static SIGNATURES: &[Signature] = &[
    Signature {
        format: ImageFormat::Png,
        min_len: 4,
        patterns: &[(0, &[0x89, 0x50, 0x4E, 0x47])],
    },
    Signature {
        format: ImageFormat::Jpeg,
        min_len: 3,
        patterns: &[(0, &[0xFF, 0xD8, 0xFF])],
    },
    Signature {
        format: ImageFormat::Gif,
        min_len: 3,
        patterns: &[(0, &[0x47, 0x49, 0x46])],
    },
    // RIFF container holding a WEBP payload
    Signature {
        format: ImageFormat::Webp,
        min_len: 12,
        patterns: &[(0, &[0x52, 0x49, 0x46, 0x46]), (8, &[0x57, 0x45, 0x42, 0x50])],
    },
    Signature {
        format: ImageFormat::Bmp,
        min_len: 2,
        patterns: &[(0, &[0x42, 0x4D])],
    },
];
