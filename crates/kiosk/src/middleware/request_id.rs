//! Request ID middleware for request tracing and correlation.
//!
//! The kiosk usually sits behind a tunnel, which may already stamp an
//! `x-request-id` on each request. That value is reused when present;
//! otherwise a UUID v4 is generated. The request ID is:
//! - Recorded on the request span opened by `TraceLayer`
//! - Tagged on the Sentry scope so capture and catalog errors can be matched
//!   to the page action that caused them
//! - Echoed in the response headers

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that ensures every request has a request ID.
///
/// An incoming header is only trusted when it is non-blank and valid ASCII;
/// anything else gets a fresh UUID v4.
///
/// The request ID is:
/// 1. Recorded on the current span's `request_id` field
/// 2. Added to the Sentry scope as a tag
/// 3. Returned in the response so the kiosk page can report it
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|id| !id.trim().is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    // The span declares the field empty; fill it in for every log line below
    Span::current().record("request_id", &request_id);

    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}
