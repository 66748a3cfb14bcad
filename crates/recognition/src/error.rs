use std::time::Duration;

use codec::CodecError;
use thiserror::Error;

/// Errors surfaced by the recognition gateway.
///
/// Decode failures are kept apart from classifier failures so the HTTP layer
/// can tell "your image is broken" from "the recognizer broke".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// The uploaded bytes could not be turned into pixels.
    #[error("image decode failed: {0}")]
    Decode(#[from] CodecError),
    /// The external text classifier failed or is not configured.
    #[error("classification failed: {0}")]
    Classification(String),
    /// The classifier did not answer in time and was stopped.
    #[error("classifier timed out after {0:?}")]
    TimedOut(Duration),
    /// Inputs are decodable but cannot be matched (e.g. template larger than background).
    #[error("invalid recognition input: {0}")]
    InvalidInput(String),
    /// Classifier configuration is inconsistent.
    #[error("invalid classifier config: {0}")]
    InvalidConfig(String),
}

impl RecognitionError {
    pub fn classification(msg: impl Into<String>) -> Self {
        RecognitionError::Classification(msg.into())
    }

    /// True when the failure was caused by the payload rather than the recognizer.
    pub fn is_decode(&self) -> bool {
        matches!(self, RecognitionError::Decode(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_errors_are_flagged() {
        let err: RecognitionError = CodecError::EmptyImage.into();
        assert!(err.is_decode());
        assert!(err.to_string().contains("image decode failed"));
    }

    #[test]
    fn classification_error_keeps_message() {
        let err = RecognitionError::classification("model exploded");
        assert!(!err.is_decode());
        assert_eq!(err.to_string(), "classification failed: model exploded");
    }
}
