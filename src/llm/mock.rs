//! Scripted provider for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::provider::{EventReceiver, LlmProvider};
use super::types::{ChatRequest, ProviderEvent};
use crate::core::errors::ApiError;

/// Embeds text onto three axes by keyword ("protein", "fiber", anything
/// else) and replays a fixed list of chat events.
#[derive(Clone, Default)]
pub struct MockProvider {
    embed_calls: Arc<AtomicUsize>,
    fail_embeddings: bool,
    events: Vec<ProviderEvent>,
    stream_error: Option<String>,
    last_request: Arc<Mutex<Option<ChatRequest>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_embeddings(mut self) -> Self {
        self.fail_embeddings = true;
        self
    }

    pub fn with_events(mut self, events: Vec<ProviderEvent>) -> Self {
        self.events = events;
        self
    }

    /// Ends the replayed stream with an upstream error.
    pub fn failing_stream(mut self, message: &str) -> Self {
        self.stream_error = Some(message.to_string());
        self
    }

    pub fn embed_calls(&self) -> Arc<AtomicUsize> {
        self.embed_calls.clone()
    }

    pub fn last_request(&self) -> Arc<Mutex<Option<ChatRequest>>> {
        self.last_request.clone()
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        if lower.contains("protein") {
            vec![1.0, 0.0, 0.0]
        } else if lower.contains("fiber") {
            vec![0.0, 1.0, 0.0]
        } else {
            vec![0.0, 0.0, 1.0]
        }
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn embedding_model(&self) -> &str {
        "mock-embed"
    }

    fn embedding_dimensions(&self) -> usize {
        3
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embeddings {
            return Err(ApiError::Upstream("embedding service unavailable".to_string()));
        }
        Ok(inputs.iter().map(|input| Self::vector_for(input)).collect())
    }

    async fn stream_chat(&self, request: ChatRequest) -> Result<EventReceiver, ApiError> {
        if let Ok(mut slot) = self.last_request.lock() {
            *slot = Some(request);
        }

        let (tx, rx) = mpsc::channel(self.events.len() + 1);
        for event in &self.events {
            let _ = tx.send(Ok(event.clone())).await;
        }
        if let Some(message) = &self.stream_error {
            let _ = tx.send(Err(ApiError::Upstream(message.clone()))).await;
        }
        Ok(rx)
    }
}
