use crate::error::Result;
use crate::types::{Chunk, Document, FileStats, SearchOptions, SearchResult, StoreStats};
use async_trait::async_trait;

/// Capability set every chunk backend provides. Callers hold
/// `Arc<dyn VectorStore>` and dispatch dynamically per call site.
///
/// Contract points the search core depends on:
///
/// - `save_chunks` upserts by chunk id and is atomic per call: concurrent
///   readers never observe a partially applied batch.
/// - `search` applies `options.path_prefix` *before* ranking, so a match
///   inside the allowed subtree ranks exactly as it would in a store that
///   contained only that subtree.
/// - Similarity is backend-defined but stable for a given backend and
///   monotone higher-is-better; raw scores are never compared across
///   backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert chunks by id. The whole batch must become visible atomically.
    /// Every vector must match the store dimension once it is fixed.
    async fn save_chunks(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Remove every chunk whose `file_path` equals `path` exactly.
    /// Returns the number of removed chunks.
    async fn delete_by_file(&self, path: &str) -> Result<usize>;

    /// Nearest-neighbor search after prefix filtering. `limit == 0` means
    /// no limit.
    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>>;

    /// All chunks in the store. Used by hybrid text search; may be expensive.
    async fn get_all_chunks(&self) -> Result<Vec<Chunk>>;

    async fn get_document(&self, name: &str) -> Result<Option<Document>>;

    async fn save_document(&self, document: Document) -> Result<()>;

    async fn list_documents(&self) -> Result<Vec<Document>>;

    /// Flush in-memory state to durable storage.
    async fn persist(&self) -> Result<()>;

    /// Release backend resources. The store must not be used afterwards.
    async fn close(&self) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Per-file chunk counts and last-write times, sorted by path.
    async fn list_files_with_stats(&self) -> Result<Vec<FileStats>>;

    async fn chunks_for_file(&self, path: &str) -> Result<Vec<Chunk>>;
}
