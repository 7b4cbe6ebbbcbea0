use crate::error::{Result, StoreError};
use crate::traits::VectorStore;
use crate::types::{Chunk, Document, FileStats, SearchOptions, SearchResult, StoreStats};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub const LOCAL_STORE_SCHEMA_VERSION: u32 = 1;

/// Embedded single-file store backed by serde_json. This is the reference
/// backend: development indexes and the test suite run against it.
///
/// All state lives behind one `RwLock`, giving the single-writer,
/// many-reader discipline the search core expects. Mutations happen under
/// the write guard, so a `save_chunks` batch is never partially visible.
pub struct LocalStore {
    path: PathBuf,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    chunks: HashMap<String, Chunk>,
    documents: BTreeMap<String, Document>,
    dimension: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct PersistedLocalStore {
    schema_version: u32,
    dimension: Option<usize>,
    chunks: BTreeMap<String, Chunk>,
    documents: BTreeMap<String, Document>,
}

impl LocalStore {
    /// Open a store file, loading existing state when the file is present.
    /// An undecodable file is a hard error: a corrupt index must surface, not
    /// silently start over.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => Self::decode(&path, &bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(err) => return Err(err.into()),
        };
        log::debug!(
            "Opened local store at {} ({} chunks)",
            path.display(),
            state.chunks.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn decode(path: &Path, bytes: &[u8]) -> Result<State> {
        let persisted: PersistedLocalStore =
            serde_json::from_slice(bytes).map_err(|err| StoreError::Corrupt {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        if persisted.schema_version != LOCAL_STORE_SCHEMA_VERSION {
            return Err(StoreError::Corrupt {
                path: path.display().to_string(),
                reason: format!(
                    "unsupported schema_version {}",
                    persisted.schema_version
                ),
            });
        }
        Ok(State {
            chunks: persisted.chunks.into_iter().collect(),
            documents: persisted.documents,
            dimension: persisted.dimension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl VectorStore for LocalStore {
    async fn save_chunks(&self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut state = self.state.write().await;

        // Validate the whole batch before touching state so the upsert stays
        // atomic: either every chunk lands or none does.
        let mut dimension = state.dimension;
        for chunk in &chunks {
            match dimension {
                Some(expected) if chunk.vector.len() != expected => {
                    return Err(StoreError::Dimension {
                        expected,
                        actual: chunk.vector.len(),
                    });
                }
                Some(_) => {}
                None => dimension = Some(chunk.vector.len()),
            }
        }

        state.dimension = dimension;
        for chunk in chunks {
            state.chunks.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn delete_by_file(&self, path: &str) -> Result<usize> {
        let mut state = self.state.write().await;
        let before = state.chunks.len();
        state.chunks.retain(|_, chunk| chunk.file_path != path);
        Ok(before - state.chunks.len())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>> {
        let state = self.state.read().await;

        if let Some(expected) = state.dimension {
            if query_vector.len() != expected {
                return Err(StoreError::Dimension {
                    expected,
                    actual: query_vector.len(),
                });
            }
        }

        // Prefix filtering happens before ranking: a match inside the allowed
        // subtree ranks as it would in a store holding only that subtree.
        let mut results: Vec<SearchResult> = state
            .chunks
            .values()
            .filter(|chunk| {
                options.path_prefix.is_empty()
                    || chunk.file_path.starts_with(&options.path_prefix)
            })
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: cosine_similarity(query_vector, &chunk.vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if limit > 0 && results.len() > limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn get_all_chunks(&self) -> Result<Vec<Chunk>> {
        let state = self.state.read().await;
        let mut chunks: Vec<Chunk> = state.chunks.values().cloned().collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(chunks)
    }

    async fn get_document(&self, name: &str) -> Result<Option<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.get(name).cloned())
    }

    async fn save_document(&self, document: Document) -> Result<()> {
        let mut state = self.state.write().await;
        state.documents.insert(document.name.clone(), document);
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents.values().cloned().collect())
    }

    async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        let persisted = PersistedLocalStore {
            schema_version: LOCAL_STORE_SCHEMA_VERSION,
            dimension: state.dimension,
            chunks: state
                .chunks
                .iter()
                .map(|(id, chunk)| (id.clone(), chunk.clone()))
                .collect(),
            documents: state.documents.clone(),
        };
        drop(state);

        let data = serde_json::to_vec_pretty(&persisted)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::debug!("Persisted local store to {}", self.path.display());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.persist().await
    }

    async fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read().await;
        let files: std::collections::HashSet<&str> = state
            .chunks
            .values()
            .map(|chunk| chunk.file_path.as_str())
            .collect();
        Ok(StoreStats {
            chunks: state.chunks.len(),
            files: files.len(),
            dimension: state.dimension,
        })
    }

    async fn list_files_with_stats(&self) -> Result<Vec<FileStats>> {
        let state = self.state.read().await;
        let mut by_file: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
        for chunk in state.chunks.values() {
            let entry = by_file.entry(chunk.file_path.as_str()).or_insert((0, 0));
            entry.0 += 1;
            entry.1 = entry.1.max(chunk.updated_at);
        }
        Ok(by_file
            .into_iter()
            .map(|(path, (chunks, last_updated))| FileStats {
                path: path.to_string(),
                chunks,
                last_updated,
            })
            .collect())
    }

    async fn chunks_for_file(&self, path: &str) -> Result<Vec<Chunk>> {
        let state = self.state.read().await;
        let mut chunks: Vec<Chunk> = state
            .chunks
            .values()
            .filter(|chunk| chunk.file_path == path)
            .cloned()
            .collect();
        chunks.sort_by_key(|chunk| chunk.start_line);
        Ok(chunks)
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{chunk_hash, unix_timestamp};
    use tempfile::TempDir;

    fn test_chunk(id: &str, path: &str, content: &str, vector: Vec<f32>) -> Chunk {
        Chunk {
            id: id.to_string(),
            file_path: path.to_string(),
            start_line: 1,
            end_line: 10,
            content: content.to_string(),
            hash: chunk_hash(content),
            vector,
            updated_at: unix_timestamp(),
        }
    }

    #[tokio::test]
    async fn search_filters_by_path_prefix_before_ranking() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("index.json")).await.unwrap();

        store
            .save_chunks(vec![
                test_chunk(
                    "1",
                    "src/handlers/user.go",
                    "func HandleUser() {}",
                    vec![0.9, 0.1, 0.0],
                ),
                test_chunk(
                    "2",
                    "src/models/user.go",
                    "type User struct {}",
                    vec![0.8, 0.2, 0.0],
                ),
                test_chunk(
                    "3",
                    "test/user_test.go",
                    "func TestUser() {}",
                    vec![0.85, 0.15, 0.0],
                ),
                test_chunk(
                    "4",
                    "api/routes/user.go",
                    "router.GET(/user)",
                    vec![0.7, 0.3, 0.0],
                ),
            ])
            .await
            .unwrap();

        let query = vec![0.9, 0.1, 0.0];
        let cases = [
            ("", 4usize),
            ("src/", 2),
            ("src/handlers/", 1),
            ("test/", 1),
            ("api/", 1),
            ("nonexistent/", 0),
        ];
        for (prefix, want) in cases {
            let results = store
                .search(&query, 10, &SearchOptions::with_prefix(prefix))
                .await
                .unwrap();
            assert_eq!(results.len(), want, "prefix {prefix:?}");
            for result in &results {
                assert!(
                    prefix.is_empty() || result.chunk.file_path.starts_with(prefix),
                    "result {} escaped prefix {prefix:?}",
                    result.chunk.file_path
                );
            }
        }
    }

    #[tokio::test]
    async fn prefix_pushdown_matches_filtered_store() {
        let tmp = TempDir::new().unwrap();
        let full = LocalStore::open(tmp.path().join("full.json")).await.unwrap();
        let filtered = LocalStore::open(tmp.path().join("sub.json")).await.unwrap();

        let chunks = vec![
            test_chunk("1", "src/a.rs", "alpha", vec![1.0, 0.0, 0.0]),
            test_chunk("2", "src/b.rs", "beta", vec![0.6, 0.8, 0.0]),
            test_chunk("3", "docs/c.md", "gamma", vec![0.9, 0.1, 0.0]),
        ];
        full.save_chunks(chunks.clone()).await.unwrap();
        filtered
            .save_chunks(
                chunks
                    .into_iter()
                    .filter(|c| c.file_path.starts_with("src/"))
                    .collect(),
            )
            .await
            .unwrap();

        let query = vec![0.8, 0.6, 0.0];
        let pushed = full
            .search(&query, 10, &SearchOptions::with_prefix("src/"))
            .await
            .unwrap();
        let reference = filtered
            .search(&query, 10, &SearchOptions::default())
            .await
            .unwrap();

        let pushed_ids: Vec<&str> = pushed.iter().map(|r| r.chunk.id.as_str()).collect();
        let reference_ids: Vec<&str> = reference.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(pushed_ids, reference_ids);
    }

    #[tokio::test]
    async fn save_chunks_rejects_mixed_dimensions() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("index.json")).await.unwrap();

        store
            .save_chunks(vec![test_chunk("1", "a.rs", "x", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = store
            .save_chunks(vec![test_chunk("2", "b.rs", "y", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Dimension {
                expected: 3,
                actual: 2
            }
        ));

        // The failed batch must not have landed.
        assert_eq!(store.stats().await.unwrap().chunks, 1);
    }

    #[tokio::test]
    async fn delete_by_file_removes_exact_path_only() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("index.json")).await.unwrap();

        store
            .save_chunks(vec![
                test_chunk("1", "src/lib.rs", "a", vec![1.0, 0.0]),
                test_chunk("2", "src/lib.rs", "b", vec![0.0, 1.0]),
                test_chunk("3", "src/lib2.rs", "c", vec![0.5, 0.5]),
            ])
            .await
            .unwrap();

        let removed = store.delete_by_file("src/lib.rs").await.unwrap();
        assert_eq!(removed, 2);
        let remaining = store.get_all_chunks().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].file_path, "src/lib2.rs");
    }

    #[tokio::test]
    async fn persist_and_reopen_round_trips() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");

        let store = LocalStore::open(&path).await.unwrap();
        store
            .save_chunks(vec![test_chunk("1", "src/lib.rs", "alpha", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .save_document(Document {
                name: "readme".to_string(),
                content: "hello".to_string(),
                updated_at: unix_timestamp(),
            })
            .await
            .unwrap();
        store.persist().await.unwrap();

        let reopened = LocalStore::open(&path).await.unwrap();
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.dimension, Some(2));
        let doc = reopened.get_document("readme").await.unwrap().unwrap();
        assert_eq!(doc.content, "hello");
        assert!(reopened.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn close_flushes_state_to_disk() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");

        let store = LocalStore::open(&path).await.unwrap();
        store
            .save_chunks(vec![test_chunk("1", "src/lib.rs", "alpha", vec![1.0, 0.0])])
            .await
            .unwrap();
        store.close().await.unwrap();

        let reopened = LocalStore::open(&path).await.unwrap();
        assert_eq!(reopened.stats().await.unwrap().chunks, 1);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_hard_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = match LocalStore::open(&path).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn file_stats_aggregate_per_path() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::open(tmp.path().join("index.json")).await.unwrap();

        store
            .save_chunks(vec![
                test_chunk("1", "src/lib.rs", "a", vec![1.0]),
                test_chunk("2", "src/lib.rs", "b", vec![0.5]),
                test_chunk("3", "src/main.rs", "c", vec![0.2]),
            ])
            .await
            .unwrap();

        let files = store.list_files_with_stats().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[0].chunks, 2);
        assert_eq!(files[1].path, "src/main.rs");

        let lib_chunks = store.chunks_for_file("src/lib.rs").await.unwrap();
        assert_eq!(lib_chunks.len(), 2);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
