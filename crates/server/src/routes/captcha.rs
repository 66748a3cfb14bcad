use super::{record_event, run_recognition, UploadForm};
use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use admission::RouteClass;
use axum::body::Bytes;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use eventlog::{CaptchaDetail, EventChannel, Outcome, RecognitionEvent};
use pathstore::{canonical_page_url, Observation};
use recognition::WidthScale;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Text captcha upload: multipart `img` plus optional `detail` JSON.
///
/// On success the caller's `href`/`path` pair is counted towards the
/// selector recommendations and the attempt is logged; both are best effort.
pub async fn recognize_captcha(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    let detail = CaptchaDetail::parse(form.field("detail"));
    let image = form
        .file("img")
        .ok_or_else(|| ServerError::bad_request("No image uploaded"))?;

    let code = run_recognition(&state, RouteClass::TextCaptcha, move |gateway| {
        gateway.classify_text(&image)
    })
    .await?;

    observe_path(&state, &detail).await;

    let href = canonical_page_url(&detail.href).to_string();
    let event = RecognitionEvent::new(Outcome::Code(code.clone()), &detail).with_href(href);
    let echoed = serde_json::to_value(&event).unwrap_or(Value::Null);
    record_event(&state, EventChannel::Captcha, event).await;

    Ok(Json(json!({
        "success": true,
        "data": { "code": code, "detail": echoed },
    })))
}

async fn observe_path(state: &Arc<ServerState>, detail: &CaptchaDetail) {
    if detail.href.is_empty() || detail.path.is_empty() {
        return;
    }
    let store_state = Arc::clone(state);
    let (href, path) = (detail.href.clone(), detail.path.clone());
    let outcome =
        tokio::task::spawn_blocking(move || store_state.paths.observe(&href, &path)).await;

    match outcome {
        Ok(Ok(Observation::Recorded { .. })) => {
            metrics::counter!("captcha_path_observations_total").increment(1);
        }
        Ok(Ok(Observation::Ignored)) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "selector path observation dropped"),
        Err(e) => tracing::warn!(error = %e, "selector path task failed"),
    }
}

#[derive(Debug, Deserialize)]
pub struct OcrRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
}

/// Base64 OCR: `{image, detail}`; `image` may be a data URL.
pub async fn recognize_ocr(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<OcrRequest>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(request) = body.map_err(|e| ServerError::bad_request(e.body_text()))?;
    let image = request
        .image
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ServerError::bad_request("No image"))?;
    let detail = request.detail.unwrap_or_else(|| json!({}));

    let code = run_recognition(&state, RouteClass::Ocr, move |gateway| {
        let bytes = codec::decode_base64_payload(&image)?;
        gateway.classify_text(&bytes)
    })
    .await?;

    let summary = CaptchaDetail::from_value(&detail);
    let event = RecognitionEvent::new(Outcome::Code(code.clone()), &summary).with_detail(detail);
    record_event(&state, EventChannel::Ocr, event).await;

    Ok(Json(json!({ "success": true, "data": { "code": code } })))
}

/// Parse an optional width field. Absent or blank means "not supplied".
fn width_field(form: &UploadForm, name: &str) -> ServerResult<f64> {
    match form.field(name).map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| ServerError::bad_request(format!("{name} must be a number, got `{raw}`"))),
    }
}

/// Slider captcha: locate `target_img` inside `bg_img`.
///
/// When both `targetWidth` (rendered) and `bgWidth` (raw) are given, x is
/// scaled from raw to rendered pixels.
pub async fn slide_captcha(
    State(state): State<Arc<ServerState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ServerResult<Json<Value>> {
    let form = UploadForm::read(multipart).await?;
    let target_width = width_field(&form, "targetWidth")?;
    let bg_width = width_field(&form, "bgWidth")?;
    let detail = CaptchaDetail::parse(form.field("detail"));

    let (Some(background), Some(target)) = (form.file("bg_img"), form.file("target_img")) else {
        return Err(ServerError::bad_request("Missing image"));
    };
    let scale = WidthScale::new(target_width, bg_width);

    let position = run_recognition(&state, RouteClass::SlideCaptcha, move |gateway| {
        gateway.locate_gap(&background, &target, scale)
    })
    .await?;

    let event = RecognitionEvent::new(Outcome::Target(position.as_pair()), &detail);
    let timestamp = event.timestamp;
    record_event(&state, EventChannel::Slide, event).await;

    Ok(Json(json!({
        "success": true,
        "data": { "target": position.as_pair(), "timestamp": timestamp },
    })))
}

/// Alternate OCR: strict base64 in, `{success, text}` out. Failures are
/// reported in the body with status 200.
pub async fn recognize_jwocr(State(state): State<Arc<ServerState>>, body: Bytes) -> Json<Value> {
    match jwocr(&state, &body).await {
        Ok(text) => Json(json!({ "success": true, "text": text })),
        Err(e) => {
            tracing::debug!(error = %e, "jwocr request failed");
            Json(json!({ "success": false, "error": e.to_string() }))
        }
    }
}

async fn jwocr(state: &Arc<ServerState>, body: &[u8]) -> ServerResult<String> {
    let request: Value = serde_json::from_slice(body)
        .map_err(|e| ServerError::bad_request(format!("invalid JSON body: {e}")))?;
    let image = request
        .get("image")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::bad_request("No image"))?
        .to_string();

    let text = run_recognition(state, RouteClass::AltOcr, move |gateway| {
        let bytes = codec::decode_base64_strict(&image)?;
        gateway.classify_text(&bytes)
    })
    .await?;

    let event = RecognitionEvent::new(Outcome::Code(text.clone()), &CaptchaDetail::default());
    record_event(state, EventChannel::Ocr, event).await;
    Ok(text)
}
