//! Request-body decoding shared by the JSON handlers.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` so the API key is checked
//! before the body is looked at, then decode it here into the same error
//! shapes the services return.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::core::errors::{ApiError, FieldErrors};

pub const INVALID_INPUT: &str = "Invalid input";

/// Body of an action request. Any decoding failure is a 400 "Invalid input".
pub fn action_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection.body_text());
        ApiError::BadRequest(INVALID_INPUT.to_string())
    })
}

/// Body of a form submission. Decoding failures become a form-level
/// validation error under `root`.
pub fn form_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!("Rejected form body: {}", rejection.body_text());
        let mut errors = FieldErrors::new();
        errors.add("root", INVALID_INPUT);
        ApiError::Validation(errors)
    })
}
