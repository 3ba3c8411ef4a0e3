//! Nutrition kiosk library.
//!
//! This crate provides the kiosk server as a library, allowing it to be
//! tested and reused. The binary in `main.rs` only wires configuration,
//! tracing and Sentry around [`app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod capture;
pub mod config;
pub mod error;
pub mod filters;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{Request, StatusCode},
    middleware::from_fn,
    routing::get,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::state::AppState;

/// Directory served under `/static`, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/kiosk/static";

/// Build the kiosk router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the remote catalog answers before returning OK.
/// Returns 503 Service Unavailable if it does not.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.catalog().fetch_products(None).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
