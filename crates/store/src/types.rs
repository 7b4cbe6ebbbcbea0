use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// A contiguous text region of a single file, the unit of indexing and
/// retrieval. `start_line`/`end_line` are 1-based inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier, unique within one index.
    pub id: String,

    /// Slash-normalized path relative to the scope root.
    pub file_path: String,

    pub start_line: usize,
    pub end_line: usize,

    /// Raw chunk text.
    pub content: String,

    /// Embedding vector. Within one index every vector has the same length,
    /// equal to the owning embedder's declared dimension.
    pub vector: Vec<f32>,

    /// Content fingerprint (hex SHA-256).
    pub hash: String,

    /// Unix epoch seconds of the last write.
    pub updated_at: u64,
}

/// A chunk paired with a retrieval score. Scores are monotone
/// higher-is-better within one returned list; scores from different stages
/// are not comparable across stages.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Options applied by the backend before ranking.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Empty means no filter; otherwise only chunks whose `file_path` starts
    /// with this exact string are considered (case-sensitive, no glob).
    pub path_prefix: String,
}

impl SearchOptions {
    pub fn with_prefix(path_prefix: impl Into<String>) -> Self {
        Self {
            path_prefix: path_prefix.into(),
        }
    }
}

/// Named auxiliary blob stored alongside chunks (project docs, summaries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub content: String,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub chunks: usize,
    pub files: usize,
    /// None until the first chunk batch fixes the index dimension.
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileStats {
    pub path: String,
    pub chunks: usize,
    pub last_updated: u64,
}

/// Hex SHA-256 fingerprint of chunk content.
pub fn chunk_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Current time as unix epoch seconds.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_hash_is_stable_and_content_sensitive() {
        assert_eq!(chunk_hash("fn main() {}"), chunk_hash("fn main() {}"));
        assert_ne!(chunk_hash("fn main() {}"), chunk_hash("fn main() { }"));
        assert_eq!(chunk_hash("").len(), 64);
    }
}
