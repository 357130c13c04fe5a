use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use super::body::action_body;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

pub async fn get_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let config = state.config.load_config()?;
    Ok(Json(state.config.redact_sensitive_values(&config)))
}

pub async fn patch_config(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let payload = action_body(payload)?;
    if !payload.is_object() {
        return Err(ApiError::BadRequest("Config patch must be an object".to_string()));
    }
    state.config.update_config(payload, true)?;
    Ok(Json(json!({"success": true, "restart_required": true})))
}
