use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::body::action_body;
use crate::core::errors::{ApiError, FieldErrors};
use crate::core::security::require_api_key;
use crate::rag::SearchParams;
use crate::state::AppState;

const MAX_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
    pub threshold: Option<f32>,
}

impl SearchRequest {
    fn params(&self, defaults: SearchParams) -> Result<SearchParams, ApiError> {
        let mut errors = FieldErrors::new();
        if self.query.trim().is_empty() {
            errors.add("query", "Query is required");
        }
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                errors.add("limit", format!("Limit must be between 1 and {}", MAX_LIMIT));
            }
        }
        if let Some(threshold) = self.threshold {
            if !(-1.0..=1.0).contains(&threshold) {
                errors.add("threshold", "Threshold must be between -1 and 1");
            }
        }
        errors.into_result()?;

        Ok(SearchParams {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let payload = action_body(payload)?;
    let params = payload.params(state.retriever.defaults())?;
    let context = state.retriever.retrieve_with(&payload.query, params).await?;
    Ok(Json(json!({
        "success": true,
        "matches": context.matches,
        "context": context.text
    })))
}
