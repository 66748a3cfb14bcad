//! Captcha payload decoding.
//!
//! Everything a caller uploads arrives in one of two shapes: raw bytes from a
//! multipart file field, or a base64 string inside a JSON body (optionally
//! wrapped in a `data:` URL). This crate turns either into bytes and, when
//! pixels are needed, into an RGB8 buffer.
//!
//! Nothing here holds state. All functions are pure and safe to call from any
//! thread.
//!
//! ## Example
//!
//! ```
//! use codec::{decode_base64_payload, CodecError};
//!
//! let bytes = decode_base64_payload("data:image/png;base64,aGVsbG8=").unwrap();
//! assert_eq!(bytes, b"hello");
//!
//! assert_eq!(decode_base64_payload("   "), Err(CodecError::EmptyBase64));
//! ```

mod error;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use image::{ImageFormat, RgbImage};
use tracing::debug;

pub use crate::error::CodecError;

/// Standard alphabet, padding optional. Browser `toDataURL` output is always
/// padded but hand-built payloads frequently are not.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A fully decoded image.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// Container format detected from the leading bytes.
    pub format: ImageFormat,
    /// Pixels converted to 8-bit RGB.
    pub pixels: RgbImage,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Detect the image container from its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Decode raw image bytes (PNG, JPEG, GIF, BMP or WebP) into RGB pixels.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::EmptyImage);
    }

    let format = sniff_format(bytes).ok_or(CodecError::UnsupportedFormat)?;
    let dynamic = image::load_from_memory_with_format(bytes, format)?;
    let pixels = dynamic.to_rgb8();

    debug!(
        format = ?format,
        width = pixels.width(),
        height = pixels.height(),
        "decoded image payload"
    );

    Ok(DecodedImage { format, pixels })
}

/// Decode a base64 image field, accepting either bare base64 or a data URL.
///
/// Everything up to and including the last `,` is discarded, so
/// `data:image/png;base64,iVBOR...` and `iVBOR...` decode to the same bytes.
pub fn decode_base64_payload(input: &str) -> Result<Vec<u8>, CodecError> {
    let body = input.rsplit(',').next().unwrap_or(input);
    decode_base64_strict(body)
}

/// Decode bare base64 text. A data URL prefix is rejected as invalid input.
pub fn decode_base64_strict(input: &str) -> Result<Vec<u8>, CodecError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(CodecError::EmptyBase64);
    }
    Ok(LENIENT_BASE64.decode(compact.as_bytes())?)
}
