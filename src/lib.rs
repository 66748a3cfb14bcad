//! Workspace umbrella crate for the captcha solver.
//!
//! Re-exports the building blocks so library users can embed the selector
//! path store, the admission controller or the recognition gateway without
//! pulling in the HTTP service:
//!
//! - [`codec`]: image bytes, base64 and data URLs to pixels
//! - [`recognition`]: text classifiers and slider gap location
//! - [`pathstore`]: per-page selector path history
//! - [`admission`]: per-client fixed-window quotas
//! - [`eventlog`]: NDJSON recognition audit log
//! - [`server`]: the axum service (feature `server`)

pub use admission::{
    self, Admission, AdmissionController, Quota, QuotaParseError, QuotaPolicy, RouteClass,
    VisitCounter,
};
pub use codec::{self, CodecError, DecodedImage};
pub use eventlog::{self, CaptchaDetail, EventChannel, EventLog, Outcome, RecognitionEvent};
pub use pathstore::{
    self, PathRepository, PathStore, Recommendation, RepositoryConfig, StoreError,
    canonical_page_url,
};
pub use recognition::{
    self, ClassifierConfig, GapLocator, GapPosition, NccTemplateMatcher, RecognitionError,
    RecognitionGateway, TextClassifier, WidthScale,
};
#[cfg(feature = "server")]
pub use server::{self, ServerConfig, ServerError, ServerState};

use std::path::Path;
use std::sync::Arc;

/// Open the selector path history stored at `path`. A missing file starts an
/// empty history; a corrupt one is an error.
pub fn open_path_store(path: impl AsRef<Path>) -> Result<PathStore, StoreError> {
    PathStore::open(RepositoryConfig::json_file(path.as_ref()).build())
}

/// Gateway around `classifier` with the default template matcher.
pub fn gateway(classifier: impl TextClassifier + 'static) -> RecognitionGateway {
    RecognitionGateway::with_classifier(Arc::new(classifier))
}
