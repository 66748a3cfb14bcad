//! API route handlers
//!
//! - `status`: visit counter page
//! - `paths`: selector path recommendations
//! - `captcha`: text captcha, OCR and slider recognition
//! - `health`: liveness, readiness and metrics

pub mod captcha;
pub mod health;
pub mod paths;
pub mod status;

use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use admission::RouteClass;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartRejection};
use eventlog::{EventChannel, RecognitionEvent};
use recognition::{RecognitionError, RecognitionGateway};
use std::collections::HashMap;
use std::sync::Arc;

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// Run a recognition job on the blocking pool, bounded by
/// `recognition_timeout_secs`.
///
/// The wait here only releases the request. Stopping the work itself is the
/// classifier's job; the external command backend kills its child at the
/// same deadline.
pub(crate) async fn run_recognition<T, F>(
    state: &Arc<ServerState>,
    route: RouteClass,
    job: F,
) -> ServerResult<T>
where
    F: FnOnce(&RecognitionGateway) -> Result<T, RecognitionError> + Send + 'static,
    T: Send + 'static,
{
    let gateway = state.gateway.clone();
    let task = tokio::task::spawn_blocking(move || job(&gateway));

    let result = match tokio::time::timeout(state.config.recognition_timeout(), task).await {
        Ok(Ok(Err(RecognitionError::TimedOut(_)))) | Err(_) => Err(ServerError::Timeout),
        Ok(Ok(outcome)) => outcome.map_err(ServerError::from),
        Ok(Err(join)) => Err(ServerError::Internal(format!("recognition task failed: {join}"))),
    };
    if result.is_err() {
        metrics::counter!("captcha_recognition_failures_total", "route" => route.as_str())
            .increment(1);
    }
    result
}

/// Append to the event log off the async workers. Never fails the request.
pub(crate) async fn record_event(
    state: &Arc<ServerState>,
    channel: EventChannel,
    event: RecognitionEvent,
) {
    let state = Arc::clone(state);
    let task = tokio::task::spawn_blocking(move || state.events.record(channel, &event));
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "event log task failed");
    }
}

/// Multipart body split into uploaded files and plain fields.
///
/// Only parts that carry a filename count as files.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    files: HashMap<String, Bytes>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub(crate) async fn read(
        multipart: Result<Multipart, MultipartRejection>,
    ) -> ServerResult<Self> {
        let mut multipart = multipart.map_err(|e| ServerError::bad_request(e.body_text()))?;
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::bad_request(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let is_file = field.file_name().is_some_and(|f| !f.is_empty());
            let data = field
                .bytes()
                .await
                .map_err(|e| ServerError::bad_request(e.body_text()))?;
            if is_file {
                form.files.insert(name, data);
            } else {
                form.fields
                    .insert(name, String::from_utf8_lossy(&data).into_owned());
            }
        }
        Ok(form)
    }

    pub(crate) fn file(&self, name: &str) -> Option<Bytes> {
        self.files.get(name).cloned()
    }

    pub(crate) fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
