use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream;
use serde::Deserialize;

use super::body::action_body;
use crate::chat::{ChatEvent, ConversationMessage};
use crate::core::errors::ApiError;
use crate::core::security::require_api_key;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(patient_id): Path<String>,
    payload: Result<Json<ChatPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&headers, &state.api_key)?;
    let payload = action_body(payload)?;

    let receiver = state.chat.start(&patient_id, payload.messages).await?;

    let events = stream::unfold(receiver, |mut receiver| async move {
        let event = receiver.recv().await?;
        Some((Ok::<_, Infallible>(to_sse(&event)), receiver))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn to_sse(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        tracing::error!("Failed to encode chat event: {}", e);
        "{}".to_string()
    });
    Event::default().event(event.name()).data(data)
}
