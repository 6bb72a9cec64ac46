//! Request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::backend::traits::{GenerateBody, ImagePayload};
use crate::error::{AppError, Result};
use crate::AppState;

/// `POST /api/generate` - returns the raw image bytes on success
pub async fn generate(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<GenerateBody>, JsonRejection>,
) -> Result<ImagePayload> {
    let Json(body) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Invalid JSON request");
        AppError::Validation(format!("Invalid JSON: {}", rejection.body_text()))
    })?;

    state.pipeline.generate(body).await
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
