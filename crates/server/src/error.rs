use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pathstore::StoreError;
use recognition::RecognitionError;
use serde_json::json;
use std::time::Duration;

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("Recognition timed out")]
    Timeout,

    #[error("Path store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

fn retry_after_secs(wait: Duration) -> u64 {
    // Round up so a client never retries into the same window.
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

impl ServerError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ServerError::BadRequest(msg.into())
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Recognition(_)
            | ServerError::Timeout
            | ServerError::Store(_)
            | ServerError::Internal(_)
            | ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            ServerError::Recognition(e) if e.is_decode() => "DECODE_ERROR",
            ServerError::Recognition(_) => "RECOGNITION_ERROR",
            ServerError::Timeout => "RECOGNITION_TIMEOUT",
            ServerError::Store(_) => "STORE_ERROR",
            ServerError::Internal(_) => "INTERNAL_ERROR",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }

    /// Short human message; the full cause goes into `error`.
    fn summary(&self) -> String {
        match self {
            ServerError::BadRequest(msg) => msg.clone(),
            ServerError::Recognition(e) if e.is_decode() => "Image decode failed".to_string(),
            ServerError::Recognition(_) | ServerError::Timeout => "Recognition failed".to_string(),
            other => other.to_string(),
        }
    }

    fn cause(&self) -> Option<String> {
        match self {
            ServerError::BadRequest(_) | ServerError::NotFound => None,
            other => Some(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = self.error_code(), error = %self, "request failed");
        }

        let mut body = json!({
            "success": false,
            "msg": self.summary(),
            "code": self.error_code(),
        });
        if let Some(cause) = self.cause() {
            body["error"] = json!(cause);
        }

        let mut response = (status, Json(body)).into_response();
        if let ServerError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs(retry_after)));
        }
        response
    }
}
