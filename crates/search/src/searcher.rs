use crate::boost::{apply_boost, BoostConfig};
use crate::error::Result;
use crate::text::{reciprocal_rank_fusion, text_search, DEFAULT_RRF_K};
use grepai_embedder::Embedder;
use grepai_store::{SearchOptions, SearchResult, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridConfig {
    pub enabled: bool,
    /// RRF constant; values <= 0 fall back to [`DEFAULT_RRF_K`].
    pub rrf_k: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rrf_k: DEFAULT_RRF_K,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub hybrid: HybridConfig,
    #[serde(default)]
    pub boost: BoostConfig,
}

/// Orchestrates one search: embed the query, retrieve candidates (vector
/// only, or vector fused with lexical), boost, and trim.
pub struct Searcher {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    hybrid: HybridConfig,
    boost: BoostConfig,
}

impl Searcher {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            hybrid: config.hybrid,
            boost: config.boost,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        path_prefix: &str,
    ) -> Result<Vec<SearchResult>> {
        let query_vector = self.embedder.embed(query).await?;

        // Over-fetch: fusion and boosting can promote items from outside the
        // top-`limit` of either source alone.
        let fetch_limit = limit.saturating_mul(2);

        let results = if self.hybrid.enabled {
            self.hybrid_search(query, &query_vector, fetch_limit, path_prefix)
                .await?
        } else {
            self.store
                .search(
                    &query_vector,
                    fetch_limit,
                    &SearchOptions::with_prefix(path_prefix),
                )
                .await?
        };

        let mut results = apply_boost(results, &self.boost);
        if limit > 0 && results.len() > limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn hybrid_search(
        &self,
        query: &str,
        query_vector: &[f32],
        limit: usize,
        path_prefix: &str,
    ) -> Result<Vec<SearchResult>> {
        let vector_results = self
            .store
            .search(
                query_vector,
                limit,
                &SearchOptions::with_prefix(path_prefix),
            )
            .await?;

        let all_chunks = self.store.get_all_chunks().await?;
        let text_results = text_search(&all_chunks, query, limit, path_prefix);

        log::debug!(
            "Hybrid search: {} vector results, {} text results",
            vector_results.len(),
            text_results.len()
        );

        let k = if self.hybrid.rrf_k > 0.0 {
            self.hybrid.rrf_k
        } else {
            DEFAULT_RRF_K
        };
        Ok(reciprocal_rank_fusion(
            k,
            limit,
            &[vector_results, text_results],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grepai_embedder::StubEmbedder;
    use grepai_store::{chunk_hash, unix_timestamp, Chunk, LocalStore};
    use tempfile::TempDir;

    async fn seeded_store(embedder: &StubEmbedder, tmp: &TempDir) -> Arc<LocalStore> {
        let store = LocalStore::open(tmp.path().join("index.json")).await.unwrap();
        let seeds = [
            ("1", "src/handlers/user.go", "func HandleUser() { user session }"),
            ("2", "src/models/user.go", "type User struct { user profile }"),
            ("3", "test/user_test.go", "func TestUser() { user fixture }"),
        ];
        let mut chunks = Vec::new();
        for (id, path, content) in seeds {
            chunks.push(Chunk {
                id: id.to_string(),
                file_path: path.to_string(),
                start_line: 1,
                end_line: 12,
                content: content.to_string(),
                hash: chunk_hash(content),
                vector: embedder.embed(content).await.unwrap(),
                updated_at: unix_timestamp(),
            });
        }
        store.save_chunks(chunks).await.unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn search_scopes_results_to_path_prefix() {
        let tmp = TempDir::new().unwrap();
        let embedder = StubEmbedder::new(64);
        let store = seeded_store(&embedder, &tmp).await;
        let searcher = Searcher::new(store, Arc::new(StubEmbedder::new(64)), SearchConfig::default());

        let results = searcher.search("user", 10, "src/").await.unwrap();
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(result.chunk.file_path.starts_with("src/"));
        }
    }

    #[tokio::test]
    async fn vector_only_search_also_scopes() {
        let tmp = TempDir::new().unwrap();
        let embedder = StubEmbedder::new(64);
        let store = seeded_store(&embedder, &tmp).await;
        let config = SearchConfig {
            hybrid: HybridConfig {
                enabled: false,
                rrf_k: DEFAULT_RRF_K,
            },
            ..SearchConfig::default()
        };
        let searcher = Searcher::new(store, Arc::new(StubEmbedder::new(64)), config);

        let results = searcher.search("user", 10, "test/").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.file_path, "test/user_test.go");
    }

    #[tokio::test]
    async fn limit_trims_after_fusion_and_boost() {
        let tmp = TempDir::new().unwrap();
        let embedder = StubEmbedder::new(64);
        let store = seeded_store(&embedder, &tmp).await;
        let searcher = Searcher::new(store, Arc::new(StubEmbedder::new(64)), SearchConfig::default());

        let results = searcher.search("user", 2, "").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn non_positive_rrf_k_falls_back_to_default() {
        let tmp = TempDir::new().unwrap();
        let embedder = StubEmbedder::new(64);
        let store = seeded_store(&embedder, &tmp).await;
        let config = SearchConfig {
            hybrid: HybridConfig {
                enabled: true,
                rrf_k: 0.0,
            },
            ..SearchConfig::default()
        };
        let searcher = Searcher::new(store, Arc::new(StubEmbedder::new(64)), config);

        let results = searcher.search("user", 10, "").await.unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].score > 0.0);
    }
}
