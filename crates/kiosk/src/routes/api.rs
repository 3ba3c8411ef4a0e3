//! JSON API route handlers.

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use nutrition_kiosk_core::ProductId;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Look up one product through the remote `GET /product?id=` endpoint.
#[instrument(skip(state))]
pub async fn product(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse> {
    let id = ProductId::new(id);
    let summary = state
        .catalog()
        .lookup_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))?;

    Ok(Json(summary))
}
