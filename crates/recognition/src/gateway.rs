use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::classifier::TextClassifier;
use crate::matcher::{GapLocator, NccTemplateMatcher};
use crate::RecognitionError;

/// Rendered vs. raw background width, used to map a match onto a resized element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthScale {
    pub display: f64,
    pub raw: f64,
}

impl WidthScale {
    /// `None` unless both widths are positive and finite.
    pub fn new(display: f64, raw: f64) -> Option<Self> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        (usable(display) && usable(raw)).then_some(Self { display, raw })
    }

    fn apply(&self, x: u32) -> u32 {
        (f64::from(x) * self.display / self.raw).trunc() as u32
    }
}

/// Top-left coordinate of the located gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GapPosition {
    pub x: u32,
    pub y: u32,
}

impl GapPosition {
    pub fn as_pair(&self) -> [u32; 2] {
        [self.x, self.y]
    }
}

/// Single entry point for both recognition collaborators.
///
/// Cheap to clone; clones share the underlying classifier and locator.
#[derive(Clone)]
pub struct RecognitionGateway {
    classifier: Arc<dyn TextClassifier>,
    locator: Arc<dyn GapLocator>,
}

impl RecognitionGateway {
    pub fn new(classifier: Arc<dyn TextClassifier>, locator: Arc<dyn GapLocator>) -> Self {
        Self {
            classifier,
            locator,
        }
    }

    /// Gateway with the default NCC gap locator.
    pub fn with_classifier(classifier: Arc<dyn TextClassifier>) -> Self {
        Self::new(classifier, Arc::new(NccTemplateMatcher::default()))
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    /// Recognize the text in a captcha image.
    ///
    /// The bytes must decode as an image before the classifier sees them, so
    /// a garbage upload is reported as [`RecognitionError::Decode`] rather
    /// than as a classifier failure.
    pub fn classify_text(&self, image: &[u8]) -> Result<String, RecognitionError> {
        codec::decode_image(image)?;
        let text = self.classifier.classify(image)?;
        debug!(classifier = self.classifier.name(), len = text.len(), "classified text captcha");
        Ok(text)
    }

    /// Find where `target` sits inside `background`.
    ///
    /// Always yields a coordinate when both images decode: the best match is
    /// reported even if it is a poor one.
    pub fn locate_gap(
        &self,
        background: &[u8],
        target: &[u8],
        scale: Option<WidthScale>,
    ) -> Result<GapPosition, RecognitionError> {
        let background = codec::decode_image(background)?;
        let target = codec::decode_image(target)?;

        let (x, y) = self.locator.locate(&background.pixels, &target.pixels)?;
        let x = scale.map_or(x, |s| s.apply(x));

        debug!(x, y, scaled = scale.is_some(), "located slider gap");
        Ok(GapPosition { x, y })
    }
}

impl std::fmt::Debug for RecognitionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionGateway")
            .field("classifier", &self.classifier.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_scale_requires_both_widths() {
        assert!(WidthScale::new(300.0, 600.0).is_some());
        assert!(WidthScale::new(0.0, 600.0).is_none());
        assert!(WidthScale::new(300.0, 0.0).is_none());
        assert!(WidthScale::new(f64::NAN, 600.0).is_none());
    }

    #[test]
    fn scaling_truncates() {
        let scale = WidthScale::new(300.0, 600.0).unwrap();
        assert_eq!(scale.apply(200), 100);
        assert_eq!(scale.apply(201), 100);

        let scale = WidthScale::new(320.0, 280.0).unwrap();
        assert_eq!(scale.apply(100), 114);
    }
}
