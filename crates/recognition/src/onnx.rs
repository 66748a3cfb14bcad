//! Local CTC OCR through ONNX Runtime.
//!
//! Expects a single-input model taking a `[1, 1, 64, W]` float tensor of
//! grayscale pixels in `[0, 1]` and returning per-timestep argmax indices.

use std::path::Path;
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use crate::classifier::TextClassifier;
use crate::ctc::ctc_greedy_decode;
use crate::RecognitionError;

const INPUT_HEIGHT: u32 = 64;

pub struct OnnxClassifier {
    session: Mutex<Session>,
    charset: Vec<String>,
}

impl OnnxClassifier {
    pub fn load(model: &Path, charset: &Path) -> Result<Self, RecognitionError> {
        let invalid = RecognitionError::InvalidConfig;
        let raw = std::fs::read_to_string(charset)
            .map_err(|e| invalid(format!("cannot read charset {}: {e}", charset.display())))?;
        let charset: Vec<String> = serde_json::from_str(&raw)
            .map_err(|e| invalid(format!("charset is not a JSON string array: {e}")))?;

        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(model))
            .map_err(|e| invalid(format!("cannot load {}: {e}", model.display())))?;

        info!(model = %model.display(), symbols = charset.len(), "loaded onnx classifier");
        Ok(Self {
            session: Mutex::new(session),
            charset,
        })
    }
}

impl TextClassifier for OnnxClassifier {
    fn classify(&self, image: &[u8]) -> Result<String, RecognitionError> {
        let decoded = codec::decode_image(image)?;
        let gray = imageops::grayscale(&decoded.pixels);
        let aspect = decoded.width() as f64 / decoded.height().max(1) as f64;
        let width = (aspect * f64::from(INPUT_HEIGHT)).round().max(1.0) as u32;
        let resized = imageops::resize(&gray, width, INPUT_HEIGHT, FilterType::Lanczos3);
        let pixels: Vec<f32> = resized.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect();

        let input = Tensor::from_array(([1usize, 1, INPUT_HEIGHT as usize, width as usize], pixels))
            .map_err(|e| RecognitionError::classification(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| RecognitionError::classification("onnx session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| RecognitionError::classification(e.to_string()))?;
        let (_, indices) = outputs[0]
            .try_extract_tensor::<i64>()
            .map_err(|e| RecognitionError::classification(e.to_string()))?;

        Ok(ctc_greedy_decode(indices, &self.charset))
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
