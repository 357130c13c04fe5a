use std::sync::Arc;

use super::store::{SectionMatch, SectionStore};
use crate::core::errors::ApiError;
use crate::llm::LlmProvider;

/// Separator between sections in an assembled context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    pub threshold: f32,
    pub limit: usize,
}

/// Sections relevant to a query, plus their joined text.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub matches: Vec<SectionMatch>,
    pub text: String,
}

impl RetrievedContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn SectionStore>,
    provider: Arc<dyn LlmProvider>,
    defaults: SearchParams,
}

impl Retriever {
    pub fn new(
        store: Arc<dyn SectionStore>,
        provider: Arc<dyn LlmProvider>,
        defaults: SearchParams,
    ) -> Self {
        Self {
            store,
            provider,
            defaults,
        }
    }

    pub fn defaults(&self) -> SearchParams {
        self.defaults
    }

    /// Context for `query` using the configured threshold and top-K.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievedContext, ApiError> {
        self.retrieve_with(query, self.defaults).await
    }

    pub async fn retrieve_with(
        &self,
        query: &str,
        params: SearchParams,
    ) -> Result<RetrievedContext, ApiError> {
        if query.trim().is_empty() {
            return Ok(RetrievedContext::default());
        }

        let mut vectors = self.provider.embed(&[query.to_string()]).await?;
        let embedding = vectors
            .pop()
            .ok_or_else(|| ApiError::Upstream("No embedding returned for query".to_string()))?;

        let matches = self
            .store
            .search(&embedding, params.threshold, params.limit)
            .await?;

        tracing::debug!(
            matches = matches.len(),
            top = matches.first().map(|m| m.similarity),
            "Retrieved context"
        );

        let text = matches
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        Ok(RetrievedContext { matches, text })
    }
}
