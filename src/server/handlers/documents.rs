use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::body::action_body;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::rag::NewDocument;
use crate::state::AppState;

pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let documents = state.sections.list_documents().await?;
    Ok(Json(json!({"success": true, "documents": documents})))
}

pub async fn create_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewDocument>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let document = state.ingestor.ingest(action_body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "document": document})),
    ))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let document = state
        .sections
        .get_document(&document_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;
    Ok(Json(json!({"success": true, "document": document})))
}

pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    if !state.sections.delete_document(&document_id).await? {
        return Err(ApiError::NotFound("Document not found".to_string()));
    }
    tracing::info!(document_id = %document_id, "Deleted document");
    Ok(Json(json!({"success": true})))
}

pub async fn reindex_documents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let sections = state.ingestor.reindex().await?;
    Ok(Json(json!({"success": true, "sections": sections})))
}
