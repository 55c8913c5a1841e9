//! Request tracing middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap each request in a span carrying a request id, log the outcome with
/// timing, and echo the id back to the caller.
pub async fn request_tracing(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Reuse the caller's id when it sent one
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let start = Instant::now();
    let mut response = next.run(request).instrument(span.clone()).await;
    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    span.in_scope(|| {
        if response.status().is_server_error() {
            tracing::error!(status, duration_ms, "Request completed with error");
        } else if response.status().is_client_error() {
            tracing::warn!(status, duration_ms, "Request completed with client error");
        } else {
            tracing::info!(status, duration_ms, "Request completed");
        }
    });

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    response
}
