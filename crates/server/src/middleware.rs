use crate::error::ServerError;
use crate::state::ServerState;
use admission::{Admission, RouteClass};
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

/// Address the admission controller keys a request by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(pub String);

/// Route class of a guarded path, `None` for unguarded ones.
pub fn route_class(path: &str) -> Option<RouteClass> {
    match path {
        "/" => Some(RouteClass::Status),
        "/cssPath" => Some(RouteClass::PathLookup),
        "/captcha" => Some(RouteClass::TextCaptcha),
        "/ocr" => Some(RouteClass::Ocr),
        "/slideCaptcha" => Some(RouteClass::SlideCaptcha),
        "/jwocr" => Some(RouteClass::AltOcr),
        _ => None,
    }
}

fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-client quota check for the captcha routes
pub async fn admit_request(
    State(state): State<Arc<ServerState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(route) = route_class(request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer, state.config.trust_forwarded_for);

    match state.admission.admit(&client, route) {
        Admission::Allowed { .. } => {
            metrics::counter!("captcha_requests_total", "route" => route.as_str()).increment(1);
            request.extensions_mut().insert(ClientId(client));
            Ok(next.run(request).await)
        }
        Admission::Denied { limit, retry_after } => {
            metrics::counter!("captcha_admission_denied_total", "route" => route.as_str())
                .increment(1);
            tracing::info!(
                client = %client,
                route = route.as_str(),
                limit,
                retry_after_secs = retry_after.as_secs(),
                "request denied by quota"
            );
            Err(ServerError::RateLimited { retry_after })
        }
    }
}

/// Request ID injection middleware
pub async fn request_id(mut request: Request, next: Next) -> Response {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Add to request extensions for handlers to access
    request.extensions_mut().insert(request_id.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    response
}

/// Logging middleware
pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    // Get request ID if available
    let request_id = request
        .extensions()
        .get::<String>()
        .cloned()
        .unwrap_or_default();

    tracing::info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "Request started"
    );

    let response = next.run(request).await;
    let duration = start.elapsed();
    let status = response.status();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %status,
        duration_ms = %duration.as_millis(),
        request_id = %request_id,
        "Request completed"
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_paths_map_to_route_classes() {
        assert_eq!(route_class("/"), Some(RouteClass::Status));
        assert_eq!(route_class("/captcha"), Some(RouteClass::TextCaptcha));
        assert_eq!(route_class("/jwocr"), Some(RouteClass::AltOcr));
        assert_eq!(route_class("/health"), None);
        assert_eq!(route_class("/metrics"), None);
    }

    #[test]
    fn client_id_prefers_peer_unless_proxy_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.4, 10.0.0.1"));
        let peer: SocketAddr = "10.0.0.1:5555".parse().unwrap();

        assert_eq!(client_id(&headers, Some(peer), false), "10.0.0.1");
        assert_eq!(client_id(&headers, Some(peer), true), "198.51.100.4");
        assert_eq!(client_id(&HeaderMap::new(), Some(peer), true), "10.0.0.1");
        assert_eq!(client_id(&HeaderMap::new(), None, false), "unknown");
    }
}
