//! Image envelope decoding.
//!
//! Requests carry the photo as base64, often wrapped in a data URL
//! (`data:image/jpeg;base64,...`). Decoding stops at the container level:
//! the bytes are checked for a known image signature and handed to the
//! inference backend untouched.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use thiserror::Error;

/// Standard alphabet, padding optional.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors decoding the request's image payload.
#[derive(Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Invalid image data: empty payload")]
    Empty,

    #[error("Invalid image data: {0}")]
    Base64(String),

    #[error("Invalid image data: unrecognized image format")]
    UnknownFormat,
}

/// Image containers the backends accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Identify the container from its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else if bytes.starts_with(b"BM") {
            Some(Self::Bmp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }
}

/// A decoded image payload of a known container format.
#[derive(Clone, PartialEq)]
pub struct EncodedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl EncodedImage {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Canonical (padded) base64 of the image bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), self.to_base64())
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Decode a base64 image, optionally wrapped in a data URL.
///
/// Everything up to and including the first comma is treated as a header
/// and dropped. Whitespace inside the payload is ignored.
pub fn decode_image(data: &str) -> Result<EncodedImage, DecodeError> {
    let payload = match data.find(',') {
        Some(idx) => &data[idx + 1..],
        None => data,
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = LENIENT
        .decode(compact.as_bytes())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = ImageFormat::sniff(&bytes).ok_or(DecodeError::UnknownFormat)?;

    tracing::debug!(format = ?format, bytes = bytes.len(), "Decoded image payload");

    Ok(EncodedImage { bytes, format })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Smallest byte string that sniffs as PNG.
    pub(crate) fn png_bytes() -> Vec<u8> {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"\0\0\0\rIHDR");
        bytes
    }

    pub(crate) fn png_data_url() -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(png_bytes()))
    }

    #[test]
    fn test_decode_data_url() {
        let image = decode_image(&png_data_url()).unwrap();
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.bytes(), png_bytes().as_slice());
        assert_eq!(image.to_data_url(), png_data_url());
    }

    #[test]
    fn test_decode_bare_base64_without_padding() {
        let encoded = STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]);
        let unpadded = encoded.trim_end_matches('=');
        let image = decode_image(unpadded).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_whitespace_ignored() {
        let encoded = STANDARD.encode(b"GIF89a\x01\x00");
        let wrapped = format!("  {}\n{}  ", &encoded[..4], &encoded[4..]);
        assert_eq!(decode_image(&wrapped).unwrap().format(), ImageFormat::Gif);
    }

    #[test]
    fn test_sniff_webp_and_bmp() {
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(ImageFormat::WebP));
        assert_eq!(ImageFormat::sniff(b"BM\0\0"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::sniff(b"RIFF\0\0\0\0WAVE"), None);
    }

    #[test]
    fn test_empty_payload() {
        assert_eq!(decode_image("data:image/png;base64,"), Err(DecodeError::Empty));
        assert_eq!(decode_image("   "), Err(DecodeError::Empty));
    }

    #[test]
    fn test_invalid_base64() {
        assert!(matches!(decode_image("not*base64!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_unknown_format() {
        let encoded = STANDARD.encode(b"hello world");
        assert_eq!(decode_image(&encoded), Err(DecodeError::UnknownFormat));
    }
}
