use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use super::body::form_body;
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::patients::PatientInput;
use crate::state::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Patient not found".to_string())
}

pub async fn list_patients(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let patients = state.patients.list().await?;
    Ok(Json(json!({"success": true, "patients": patients})))
}

pub async fn create_patient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let fields = form_body(payload)?.validate()?;
    let patient = state.patients.create(fields).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "patient": patient})),
    ))
}

pub async fn get_patient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let patient = state.patients.get(&patient_id).await?.ok_or_else(not_found)?;
    Ok(Json(json!({"success": true, "patient": patient})))
}

pub async fn update_patient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let fields = form_body(payload)?.validate()?;
    let patient = state
        .patients
        .update(&patient_id, fields)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(json!({"success": true, "patient": patient})))
}

pub async fn delete_patient(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    if !state.patients.delete(&patient_id).await? {
        return Err(not_found());
    }
    tracing::info!(patient_id = %patient_id, "Deleted patient");
    Ok(Json(json!({"success": true})))
}
