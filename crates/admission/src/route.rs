use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Quota;

/// Guarded operations. Each one gets its own counter per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// `GET /` visit statistics page.
    Status,
    /// `GET /cssPath` selector recommendation.
    PathLookup,
    /// `POST /captcha` multipart text captcha.
    TextCaptcha,
    /// `POST /ocr` base64 OCR.
    Ocr,
    /// `POST /slideCaptcha` gap detection.
    SlideCaptcha,
    /// `POST /jwocr` alternate base64 OCR.
    AltOcr,
}

impl RouteClass {
    pub const ALL: [RouteClass; 6] = [
        RouteClass::Status,
        RouteClass::PathLookup,
        RouteClass::TextCaptcha,
        RouteClass::Ocr,
        RouteClass::SlideCaptcha,
        RouteClass::AltOcr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Status => "status",
            RouteClass::PathLookup => "path_lookup",
            RouteClass::TextCaptcha => "text_captcha",
            RouteClass::Ocr => "ocr",
            RouteClass::SlideCaptcha => "slide_captcha",
            RouteClass::AltOcr => "alt_ocr",
        }
    }
}

/// Default quota plus per-route overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaPolicy {
    default: Quota,
    overrides: HashMap<RouteClass, Quota>,
}

impl QuotaPolicy {
    pub fn new(default: Quota) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, route: RouteClass, quota: Quota) -> Self {
        self.overrides.insert(route, quota);
        self
    }

    pub fn quota_for(&self, route: RouteClass) -> Quota {
        self.overrides.get(&route).copied().unwrap_or(self.default)
    }
}

impl Default for QuotaPolicy {
    /// 100 per hour everywhere, 30 per minute for text captchas and 60 per
    /// minute for selector lookups.
    fn default() -> Self {
        QuotaPolicy::new(Quota::per_hour(100))
            .with_override(RouteClass::TextCaptcha, Quota::per_minute(30))
            .with_override(RouteClass::PathLookup, Quota::per_minute(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_documented_limits() {
        let policy = QuotaPolicy::default();
        assert_eq!(policy.quota_for(RouteClass::TextCaptcha), Quota::per_minute(30));
        assert_eq!(policy.quota_for(RouteClass::PathLookup), Quota::per_minute(60));
        for route in [
            RouteClass::Status,
            RouteClass::Ocr,
            RouteClass::SlideCaptcha,
            RouteClass::AltOcr,
        ] {
            assert_eq!(policy.quota_for(route), Quota::per_hour(100));
        }
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<_> = RouteClass::ALL.iter().map(RouteClass::as_str).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), RouteClass::ALL.len());
    }
}
