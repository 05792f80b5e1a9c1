//! Request middleware.

use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;

/// Reject mutating requests that are not `application/json` with 415.
pub async fn require_json(request: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let safe = matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if !safe && !is_json(&request) {
        log::warn!(
            "Rejected {} {}: unsupported content type",
            request.method(),
            request.uri()
        );
        return Err(ApiError::UnsupportedMediaType);
    }
    Ok(next.run(request).await)
}

fn is_json(request: &Request<Body>) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map_or(false, |mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Log each request with a fresh request id and its duration.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    // Health probes are frequent.
    let level = if uri.path() == "/health" {
        log::Level::Debug
    } else {
        log::Level::Info
    };
    log::log!(level, "Request {} {} {}", request_id, method, uri);

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    log::log!(
        level,
        "Response {} {} completed in {:?}",
        request_id,
        response.status(),
        start.elapsed()
    );
    response
}
