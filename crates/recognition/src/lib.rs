//! Recognition gateway for the captcha solver.
//!
//! Two opaque collaborators sit behind [`RecognitionGateway`]:
//!
//! - a [`TextClassifier`] that reads the characters in a text captcha, and
//! - a [`GapLocator`] that finds a slider piece inside its background.
//!
//! Both are injected as trait objects so the service can swap backends (an
//! external OCR program, a local ONNX model, deterministic stubs in tests)
//! without touching the orchestration code.
//!
//! ```
//! use std::sync::Arc;
//! use recognition::{RecognitionError, RecognitionGateway, TextClassifier};
//!
//! struct Fixed;
//!
//! impl TextClassifier for Fixed {
//!     fn classify(&self, _image: &[u8]) -> Result<String, RecognitionError> {
//!         Ok("x7k2".into())
//!     }
//!     fn name(&self) -> &str {
//!         "fixed"
//!     }
//! }
//!
//! let gateway = RecognitionGateway::with_classifier(Arc::new(Fixed));
//! // Not an image: rejected before the classifier runs.
//! assert!(gateway.classify_text(b"nope").unwrap_err().is_decode());
//! ```

mod classifier;
mod ctc;
mod error;
mod gateway;
mod matcher;
#[cfg(feature = "onnx")]
mod onnx;

pub use crate::classifier::{
    ClassifierConfig, CommandClassifier, TextClassifier, UnconfiguredClassifier,
};
pub use crate::ctc::ctc_greedy_decode;
pub use crate::error::RecognitionError;
pub use crate::gateway::{GapPosition, RecognitionGateway, WidthScale};
pub use crate::matcher::{GapLocator, NccTemplateMatcher};
#[cfg(feature = "onnx")]
pub use crate::onnx::OnnxClassifier;
