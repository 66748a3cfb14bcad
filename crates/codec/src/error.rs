//! Error types produced by the codec crate.
//!
//! | Error | Description |
//! |-------|-------------|
//! | [`EmptyImage`](CodecError::EmptyImage) | Zero bytes were uploaded |
//! | [`UnsupportedFormat`](CodecError::UnsupportedFormat) | Bytes do not start with a known image signature |
//! | [`Malformed`](CodecError::Malformed) | Signature recognized but the pixel data is broken |
//! | [`EmptyBase64`](CodecError::EmptyBase64) | Base64 field was blank |
//! | [`InvalidBase64`](CodecError::InvalidBase64) | Base64 text did not decode |

use thiserror::Error;

/// Errors surfaced while turning an uploaded payload into pixels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("image payload is empty")]
    EmptyImage,

    #[error("unsupported image format")]
    UnsupportedFormat,

    #[error("malformed image data: {0}")]
    Malformed(String),

    #[error("base64 payload is empty")]
    EmptyBase64,

    #[error("invalid base64 payload: {0}")]
    InvalidBase64(String),
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::InvalidBase64(err.to_string())
    }
}

impl From<image::ImageError> for CodecError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Unsupported(_) => CodecError::UnsupportedFormat,
            other => CodecError::Malformed(other.to_string()),
        }
    }
}
