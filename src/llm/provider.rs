use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatRequest, ProviderEvent};
use crate::core::errors::ApiError;

pub type EventReceiver = mpsc::Receiver<Result<ProviderEvent, ApiError>>;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// provider name, used in logs
    fn name(&self) -> &str;

    /// embedding model identifier recorded alongside stored vectors
    fn embedding_model(&self) -> &str;

    /// length of every vector returned by `embed`
    fn embedding_dimensions(&self) -> usize;

    /// embeddings for `inputs`, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError>;

    /// chat completion (streaming)
    async fn stream_chat(&self, request: ChatRequest) -> Result<EventReceiver, ApiError>;
}
