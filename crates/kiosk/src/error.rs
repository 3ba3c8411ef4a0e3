//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::CatalogError;
use crate::capture::WorkflowError;

/// Application-level error type for the kiosk.
#[derive(Debug, Error)]
pub enum AppError {
    /// Remote catalog read failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Capture action not allowed right now.
    #[error("Capture error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Catalog(_) => StatusCode::BAD_GATEWAY,
            Self::Workflow(err) => match err {
                WorkflowError::EmptyCapture | WorkflowError::KindMismatch { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WorkflowError::UploadInFlight | WorkflowError::InvalidTransition { .. } => {
                    StatusCode::CONFLICT
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Catalog(_)) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Catalog(_) => "Unable to load products. Please try again.".to_string(),
            Self::Workflow(err) => err.to_string(),
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for kiosk actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
