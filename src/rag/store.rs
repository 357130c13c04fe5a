//! SectionStore trait: persistence for documents, their sections and
//! section embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A knowledge-base document together with its sections (no vectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub created_at: String,
    pub sections: Vec<SectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionRecord {
    pub id: String,
    pub content: String,
}

/// A section ready to insert.
#[derive(Debug, Clone)]
pub struct NewSection {
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionMatch {
    pub section_id: String,
    pub document_id: String,
    pub content: String,
    /// Cosine similarity (higher = closer).
    pub similarity: f32,
}

/// The embedding model the stored vectors were produced with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingMeta {
    pub model: String,
    pub dimensions: usize,
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Insert a document and all of its sections atomically.
    async fn create_document(
        &self,
        name: &str,
        url: Option<&str>,
        sections: Vec<NewSection>,
    ) -> Result<DocumentRecord, ApiError>;

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ApiError>;

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>, ApiError>;

    /// Delete a document; its sections go with it.
    async fn delete_document(&self, document_id: &str) -> Result<bool, ApiError>;

    /// Sections scoring strictly above `threshold`, best first, at most `limit`.
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SectionMatch>, ApiError>;

    async fn count_sections(&self) -> Result<usize, ApiError>;

    /// Every stored section, for re-embedding.
    async fn all_sections(&self) -> Result<Vec<SectionRecord>, ApiError>;

    /// Overwrite section embeddings and the model record in one transaction.
    async fn replace_embeddings(
        &self,
        embeddings: Vec<(String, Vec<f32>)>,
        meta: &EmbeddingMeta,
    ) -> Result<(), ApiError>;

    async fn embedding_meta(&self) -> Result<Option<EmbeddingMeta>, ApiError>;

    async fn set_embedding_meta(&self, meta: &EmbeddingMeta) -> Result<(), ApiError>;
}
