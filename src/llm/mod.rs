//! Hosted language-model access: embeddings and streamed chat completions.

#[cfg(test)]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod types;

pub use openai::OpenAiProvider;
pub use provider::{EventReceiver, LlmProvider};
pub use types::{ChatMessage, ChatRequest, ProviderEvent, Role, ToolCall, ToolDefinition};
