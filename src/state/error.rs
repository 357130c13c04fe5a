use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to open database: {0}")]
    Database(#[source] anyhow::Error),

    #[error("Failed to initialize knowledge base: {0}")]
    Rag(#[source] anyhow::Error),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] anyhow::Error),

    #[error("Stored embeddings do not match the configured model: {0}")]
    EmbeddingModel(#[source] anyhow::Error),
}
