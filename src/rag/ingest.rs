//! Document ingestion: validate, split, embed, persist.

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;

use super::splitter::split_sections;
use super::store::{DocumentRecord, EmbeddingMeta, NewSection, SectionStore};
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

/// Upper bound on inputs per embedding request.
pub const EMBED_BATCH_SIZE: usize = 256;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Clone)]
pub struct DocumentIngestor {
    store: Arc<dyn SectionStore>,
    provider: Arc<dyn LlmProvider>,
}

impl DocumentIngestor {
    pub fn new(store: Arc<dyn SectionStore>, provider: Arc<dyn LlmProvider>) -> Self {
        Self { store, provider }
    }

    pub async fn ingest(&self, document: NewDocument) -> Result<DocumentRecord, ApiError> {
        let name = document.name.trim();
        if name.is_empty() || document.content.trim().is_empty() {
            return Err(ApiError::BadRequest("Invalid input".to_string()));
        }
        let url = normalize_url(document.url.as_deref())?;

        let sections = split_sections(&document.content);
        if sections.is_empty() {
            return Err(ApiError::BadRequest("Invalid input".to_string()));
        }

        let embeddings = embed_in_batches(self.provider.as_ref(), &sections).await?;
        let new_sections: Vec<NewSection> = sections
            .into_iter()
            .zip(embeddings)
            .map(|(content, embedding)| NewSection { content, embedding })
            .collect();

        let record = self
            .store
            .create_document(name, url.as_deref(), new_sections)
            .await?;

        tracing::info!(
            document_id = %record.id,
            sections = record.sections.len(),
            "Ingested document '{}'",
            record.name
        );
        Ok(record)
    }

    /// Re-embeds every stored section with the provider's current model.
    /// Returns the number of sections rewritten.
    pub async fn reindex(&self) -> Result<usize, ApiError> {
        let sections = self.store.all_sections().await?;
        let contents: Vec<String> = sections.iter().map(|s| s.content.clone()).collect();
        let embeddings = embed_in_batches(self.provider.as_ref(), &contents).await?;

        let updates: Vec<(String, Vec<f32>)> = sections
            .into_iter()
            .map(|s| s.id)
            .zip(embeddings)
            .collect();
        let count = updates.len();

        self.store
            .replace_embeddings(updates, &self.current_meta())
            .await?;

        tracing::info!(
            sections = count,
            model = self.provider.embedding_model(),
            "Re-embedded knowledge base"
        );
        Ok(count)
    }

    /// Makes sure stored vectors come from the configured embedding model.
    ///
    /// A fresh or empty store just records the model. A store populated by
    /// a different model is re-embedded when `reindex_on_change` is set and
    /// refused otherwise.
    pub async fn ensure_embedding_model(&self, reindex_on_change: bool) -> Result<(), ApiError> {
        let current = self.current_meta();
        let stored = self.store.embedding_meta().await?;

        if stored.as_ref() == Some(&current) {
            return Ok(());
        }

        let section_count = self.store.count_sections().await?;
        if section_count == 0 {
            return self.store.set_embedding_meta(&current).await;
        }

        match stored {
            Some(previous) if !reindex_on_change => Err(ApiError::Internal(format!(
                "Stored embeddings were produced by {} ({} dims) but {} ({} dims) is configured",
                previous.model, previous.dimensions, current.model, current.dimensions
            ))),
            previous => {
                tracing::warn!(
                    previous = ?previous,
                    configured = %current.model,
                    "Embedding model changed; re-embedding {} sections",
                    section_count
                );
                self.reindex().await.map(|_| ())
            }
        }
    }

    fn current_meta(&self) -> EmbeddingMeta {
        EmbeddingMeta {
            model: self.provider.embedding_model().to_string(),
            dimensions: self.provider.embedding_dimensions(),
        }
    }
}

fn normalize_url(raw: Option<&str>) -> Result<Option<String>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    Url::parse(raw)
        .map(|_| Some(raw.to_string()))
        .map_err(|_| ApiError::BadRequest("Invalid input".to_string()))
}

/// Embeds `inputs` in request-sized batches, checking count and length of
/// every returned vector.
pub async fn embed_in_batches(
    provider: &dyn LlmProvider,
    inputs: &[String],
) -> Result<Vec<Vec<f32>>, ApiError> {
    let mut embeddings = Vec::with_capacity(inputs.len());

    for batch in inputs.chunks(EMBED_BATCH_SIZE) {
        let vectors = provider.embed(batch).await?;
        if vectors.len() != batch.len() {
            return Err(ApiError::Upstream(format!(
                "{} returned {} embeddings for {} inputs",
                provider.name(),
                vectors.len(),
                batch.len()
            )));
        }
        if let Some(bad) = vectors
            .iter()
            .find(|v| v.len() != provider.embedding_dimensions())
        {
            return Err(ApiError::Upstream(format!(
                "{} returned a {}-dimensional embedding, expected {}",
                provider.name(),
                bad.len(),
                provider.embedding_dimensions()
            )));
        }
        embeddings.extend(vectors);
    }

    Ok(embeddings)
}
