//! SQLite-backed section store.
//!
//! Documents and sections live in ordinary tables; embeddings are stored
//! as little-endian `f32` BLOBs and searched by brute-force cosine
//! similarity.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::similarity::{cosine_similarity, decode_embedding, encode_embedding};
use super::store::{
    DocumentRecord, EmbeddingMeta, NewSection, SectionMatch, SectionRecord, SectionStore,
};
use crate::core::errors::ApiError;

pub struct SqliteSectionStore {
    pool: SqlitePool,
    dimensions: usize,
}

impl SqliteSectionStore {
    pub async fn new(pool: SqlitePool, dimensions: usize) -> Result<Self, ApiError> {
        let store = Self { pool, dimensions };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS document_sections (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sections_document ON document_sections(document_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn check_dimensions(expected: usize, embedding: &[f32]) -> Result<(), ApiError> {
        if embedding.len() != expected {
            return Err(ApiError::Internal(format!(
                "Embedding has {} dimensions, store expects {}",
                embedding.len(),
                expected
            )));
        }
        Ok(())
    }

    fn row_to_section(row: &SqliteRow) -> Result<SectionRecord, ApiError> {
        Ok(SectionRecord {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
        })
    }

    async fn sections_by_document(
        &self,
        document_id: Option<&str>,
    ) -> Result<HashMap<String, Vec<SectionRecord>>, ApiError> {
        let rows = match document_id {
            Some(document_id) => {
                sqlx::query(
                    "SELECT id, document_id, content FROM document_sections
                     WHERE document_id = ?1
                     ORDER BY position",
                )
                .bind(document_id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, document_id, content FROM document_sections
                     ORDER BY document_id, position",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut grouped: HashMap<String, Vec<SectionRecord>> = HashMap::new();
        for row in &rows {
            let owner: String = row.try_get("document_id")?;
            grouped
                .entry(owner)
                .or_default()
                .push(Self::row_to_section(row)?);
        }
        Ok(grouped)
    }

    fn row_to_document(
        row: &SqliteRow,
        sections: &mut HashMap<String, Vec<SectionRecord>>,
    ) -> Result<DocumentRecord, ApiError> {
        let id: String = row.try_get("id")?;
        let sections = sections.remove(&id).unwrap_or_default();
        Ok(DocumentRecord {
            name: row.try_get("name")?,
            url: row.try_get("url")?,
            created_at: row.try_get("created_at")?,
            id,
            sections,
        })
    }
}

#[async_trait]
impl SectionStore for SqliteSectionStore {
    async fn create_document(
        &self,
        name: &str,
        url: Option<&str>,
        sections: Vec<NewSection>,
    ) -> Result<DocumentRecord, ApiError> {
        for section in &sections {
            Self::check_dimensions(self.dimensions, &section.embedding)?;
        }

        let document_id = uuid::Uuid::new_v4().to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO documents (id, name, url) VALUES (?1, ?2, ?3)")
            .bind(&document_id)
            .bind(name)
            .bind(url)
            .execute(&mut *tx)
            .await?;

        for (position, section) in sections.iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_sections (id, document_id, position, content, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&document_id)
            .bind(position as i64)
            .bind(&section.content)
            .bind(encode_embedding(&section.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_document(&document_id)
            .await?
            .ok_or_else(|| ApiError::internal("created document could not be read back"))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, ApiError> {
        let rows = sqlx::query("SELECT id, name, url, created_at FROM documents ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;

        let mut sections = self.sections_by_document(None).await?;
        rows.iter()
            .map(|row| Self::row_to_document(row, &mut sections))
            .collect()
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>, ApiError> {
        let row = sqlx::query("SELECT id, name, url, created_at FROM documents WHERE id = ?1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut sections = self.sections_by_document(Some(document_id)).await?;
        Self::row_to_document(&row, &mut sections).map(Some)
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SectionMatch>, ApiError> {
        let rows = sqlx::query("SELECT id, document_id, content, embedding FROM document_sections")
            .fetch_all(&self.pool)
            .await?;

        let mut scored = Vec::new();
        for row in &rows {
            let embedding_bytes: Vec<u8> = row.try_get("embedding")?;
            let stored = decode_embedding(&embedding_bytes);
            if stored.len() != query_embedding.len() {
                continue;
            }

            let similarity = cosine_similarity(query_embedding, &stored);
            if similarity > threshold {
                scored.push(SectionMatch {
                    section_id: row.try_get("id")?,
                    document_id: row.try_get("document_id")?,
                    content: row.try_get("content")?,
                    similarity,
                });
            }
        }

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count_sections(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_sections")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }

    async fn all_sections(&self) -> Result<Vec<SectionRecord>, ApiError> {
        let rows = sqlx::query("SELECT id, content FROM document_sections ORDER BY document_id, position")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_section).collect()
    }

    async fn replace_embeddings(
        &self,
        embeddings: Vec<(String, Vec<f32>)>,
        meta: &EmbeddingMeta,
    ) -> Result<(), ApiError> {
        for (_, embedding) in &embeddings {
            Self::check_dimensions(meta.dimensions, embedding)?;
        }

        let mut tx = self.pool.begin().await?;

        for (section_id, embedding) in &embeddings {
            sqlx::query("UPDATE document_sections SET embedding = ?1 WHERE id = ?2")
                .bind(encode_embedding(embedding))
                .bind(section_id)
                .execute(&mut *tx)
                .await?;
        }

        for (key, value) in [
            ("embedding_model", meta.model.clone()),
            ("embedding_dimensions", meta.dimensions.to_string()),
        ] {
            sqlx::query(
                "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
                 VALUES (?1, ?2, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn embedding_meta(&self) -> Result<Option<EmbeddingMeta>, ApiError> {
        let model: Option<String> =
            sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = 'embedding_model'")
                .fetch_optional(&self.pool)
                .await?;
        let dimensions: Option<String> =
            sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = 'embedding_dimensions'")
                .fetch_optional(&self.pool)
                .await?;

        Ok(match (model, dimensions) {
            (Some(model), Some(dimensions)) => Some(EmbeddingMeta {
                model,
                dimensions: dimensions.parse().map_err(ApiError::internal)?,
            }),
            _ => None,
        })
    }

    async fn set_embedding_meta(&self, meta: &EmbeddingMeta) -> Result<(), ApiError> {
        self.replace_embeddings(Vec::new(), meta).await
    }
}
