use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let sections = state.sections.count_sections().await?;
    Ok(Json(json!({
        "status": "ok",
        "sections": sections,
        "version": env!("CARGO_PKG_VERSION")
    })))
}
