use std::sync::Arc;

use crate::chat::{ChatOptions, ChatService, ToolExecutor};
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::core::security::ApiKey;
use crate::database;
use crate::llm::{LlmProvider, OpenAiProvider};
use crate::patients::PatientStore;
use crate::rag::{DocumentIngestor, Retriever, SearchParams, SectionStore, SqliteSectionStore};

pub mod error;

use error::InitializationError;

/// State shared by every route.
///
/// Settings are read once at startup; configuration saved through the API
/// takes effect on the next start.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub api_key: ApiKey,
    pub patients: PatientStore,
    pub sections: Arc<dyn SectionStore>,
    pub ingestor: DocumentIngestor,
    pub retriever: Retriever,
    pub chat: ChatService,
}

impl AppState {
    /// Loads configuration from the standard locations and connects to the
    /// configured OpenAI-compatible provider.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let provider = Arc::new(
            OpenAiProvider::new(&settings.openai).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        Self::build(paths, settings, provider).await
    }

    /// Wires the stores and services together.
    ///
    /// 1. Opens the database and creates the schema
    /// 2. Checks stored embeddings against the provider's model, re-embedding
    ///    when allowed
    /// 3. Builds retrieval and chat services from the settings
    pub async fn build(
        paths: Arc<AppPaths>,
        settings: Settings,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let db_path = settings
            .database
            .path
            .clone()
            .unwrap_or_else(|| paths.db_path.clone());

        let pool = database::connect(&db_path)
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        let patients = PatientStore::new(pool.clone())
            .await
            .map_err(|e| InitializationError::Database(e.into()))?;

        let sections: Arc<dyn SectionStore> = Arc::new(
            SqliteSectionStore::new(pool, provider.embedding_dimensions())
                .await
                .map_err(|e| InitializationError::Rag(e.into()))?,
        );

        let ingestor = DocumentIngestor::new(sections.clone(), provider.clone());
        ingestor
            .ensure_embedding_model(settings.rag.reindex_on_model_change)
            .await
            .map_err(|e| InitializationError::EmbeddingModel(e.into()))?;

        let retriever = Retriever::new(
            sections.clone(),
            provider.clone(),
            SearchParams {
                threshold: settings.rag.similarity_threshold,
                limit: settings.rag.max_sections,
            },
        );

        let chat = ChatService::new(
            patients.clone(),
            retriever.clone(),
            provider,
            ToolExecutor::new(settings.chat.appointment_delay()),
            ChatOptions {
                model: settings.openai.chat_model.clone(),
                temperature: settings.openai.temperature,
            },
        );

        let api_key = ApiKey::new(settings.server.api_key.clone());
        if api_key.is_enabled() {
            tracing::info!("API key required for /api routes");
        }

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            api_key,
            patients,
            sections,
            ingestor,
            retriever,
            chat,
        }))
    }
}
