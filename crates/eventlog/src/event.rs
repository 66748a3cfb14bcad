use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;

/// What the recognizer produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Recognized captcha text.
    Code(String),
    /// Slider gap coordinate `[x, y]`.
    Target([u32; 2]),
}

/// Context a caller reports alongside an upload.
///
/// Parsed leniently: anything that is not a JSON object, or a field of the
/// wrong type, is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptchaDetail {
    pub href: String,
    pub path: String,
    pub src: Option<String>,
    pub host: Option<String>,
}

impl CaptchaDetail {
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            href: text("href").unwrap_or_default(),
            path: text("path").unwrap_or_default(),
            src: text("src"),
            host: text("host"),
        }
    }

    /// Parse the raw `detail` form field; malformed JSON yields an empty detail.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str::<Value>(s).ok())
            .map(|v| Self::from_value(&v))
            .unwrap_or_default()
    }
}

/// One line of the recognition audit log. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionEvent {
    #[serde(flatten)]
    pub outcome: Outcome,
    pub path: String,
    pub src: Option<String>,
    pub href: String,
    pub host: Option<String>,
    /// Caller-supplied detail object kept verbatim (used by the OCR routes).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    pub timestamp: DateTime<Local>,
}

impl RecognitionEvent {
    pub fn new(outcome: Outcome, context: &CaptchaDetail) -> Self {
        Self {
            outcome,
            path: context.path.clone(),
            src: context.src.clone(),
            href: context.href.clone(),
            host: context.host.clone(),
            detail: None,
            timestamp: Local::now(),
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = href.into();
        self
    }
}
