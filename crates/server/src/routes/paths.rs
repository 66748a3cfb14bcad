use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::{Query, State};
use axum::Json;
use pathstore::canonical_page_url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct CssPathQuery {
    #[serde(default)]
    pub href: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CssPathResponse {
    pub success: bool,
    pub path: Option<String>,
    pub recommend_times: u64,
}

/// Most frequently reported selector path for a page.
///
/// `GET /cssPath?href=...`; the query string of `href` itself is ignored.
pub async fn css_path(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<CssPathQuery>,
) -> ServerResult<Json<CssPathResponse>> {
    let href = query.href.as_deref().map(canonical_page_url).unwrap_or_default();
    if href.is_empty() {
        return Err(ServerError::bad_request("Missing href parameter"));
    }

    // Observers hold the write lock across the disk save; wait for it off
    // the async workers.
    let href = href.to_string();
    let store_state = Arc::clone(&state);
    let recommendation = tokio::task::spawn_blocking(move || store_state.paths.recommend(&href))
        .await
        .map_err(|e| ServerError::Internal(format!("path lookup failed: {e}")))?;
    Ok(Json(CssPathResponse {
        success: true,
        path: recommendation.path,
        recommend_times: recommendation.count,
    }))
}
