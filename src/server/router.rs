use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::security::API_KEY_HEADER;
use crate::server::handlers::{chat, config, documents, health, patients, search};
use crate::state::AppState;

/// Creates the application router.
///
/// Every `/api` handler checks the API key itself; `/health` is open.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/config",
            get(config::get_config).patch(config::patch_config),
        )
        .route(
            "/api/patients",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route(
            "/api/patients/:patient_id",
            get(patients::get_patient)
                .put(patients::update_patient)
                .delete(patients::delete_patient),
        )
        .route("/api/patients/:patient_id/chat", post(chat::chat))
        .route(
            "/api/documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/api/documents/reindex", post(documents::reindex_documents))
        .route(
            "/api/documents/:document_id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/search", post(search::search))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(configured: &[String]) -> CorsLayer {
    let mut origins = resolve_allowed_origins(configured);
    if origins.is_empty() {
        origins = default_local_origins();
    }
    let allow_origin = AllowOrigin::list(
        origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect::<Vec<_>>(),
    );

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(API_KEY_HEADER),
        ])
}

fn resolve_allowed_origins(configured: &[String]) -> Vec<String> {
    configured
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_local_origins() -> Vec<String> {
    vec![
        "http://localhost".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
        "http://127.0.0.1".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}
