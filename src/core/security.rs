use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::core::errors::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret guarding the `/api` routes. An unset key leaves the API
/// open, which matches running on localhost behind a frontend.
#[derive(Debug, Clone, Default)]
pub struct ApiKey {
    value: Option<String>,
}

impl ApiKey {
    pub fn new(value: Option<String>) -> Self {
        Self {
            value: value.filter(|v| !v.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.value.is_some()
    }
}

pub fn require_api_key(headers: &HeaderMap, expected: &ApiKey) -> Result<(), ApiError> {
    let Some(expected) = expected.value.as_deref() else {
        return Ok(());
    };

    let header_value = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if header_value.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    if !bool::from(header_value.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(ApiError::Unauthorized);
    }

    Ok(())
}
