//! Retrieval pipeline over the knowledge base.
//!
//! - `split_sections`: cuts raw document text on dash delimiters
//! - `DocumentIngestor`: embeds sections and stores them with their document
//! - `Retriever`: embeds a query and returns the closest sections as context

mod ingest;
mod retriever;
mod similarity;
mod splitter;
mod sqlite;
mod store;

pub use ingest::{embed_in_batches, DocumentIngestor, NewDocument, EMBED_BATCH_SIZE};
pub use retriever::{RetrievedContext, Retriever, SearchParams, CONTEXT_SEPARATOR};
pub use similarity::cosine_similarity;
pub use splitter::split_sections;
pub use sqlite::SqliteSectionStore;
pub use store::{
    DocumentRecord, EmbeddingMeta, NewSection, SectionMatch, SectionRecord, SectionStore,
};
