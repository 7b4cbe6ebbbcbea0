use grepai_store::{Chunk, SearchResult};
use std::collections::HashMap;

/// RRF constant used when the configured value is missing or non-positive.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Split a query into lowercase tokens, dropping tokens shorter than two
/// characters (articles, single letters).
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Lexical search over chunks. Each chunk is scored by the fraction of
/// distinct query tokens its lowercased content contains as substrings;
/// chunks matching no token are omitted. When `path_prefix` is non-empty,
/// only chunks whose path starts with it are considered. `limit == 0` means
/// no limit.
pub fn text_search(
    chunks: &[Chunk],
    query: &str,
    limit: usize,
    path_prefix: &str,
) -> Vec<SearchResult> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut results = Vec::new();
    for chunk in chunks {
        if !path_prefix.is_empty() && !chunk.file_path.starts_with(path_prefix) {
            continue;
        }

        let content_lower = chunk.content.to_lowercase();
        let match_count = tokens
            .iter()
            .filter(|token| content_lower.contains(token.as_str()))
            .count();

        if match_count > 0 {
            results.push(SearchResult {
                chunk: chunk.clone(),
                score: match_count as f32 / tokens.len() as f32,
            });
        }
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if limit > 0 && results.len() > limit {
        results.truncate(limit);
    }
    results
}

/// Merge ranked lists with Reciprocal Rank Fusion: each appearance at
/// 0-based `rank` contributes `1 / (k + rank + 1)` to the chunk's score.
/// Rank-only fusion is insensitive to the source lists' score scales, which
/// is what lets vector and lexical results combine. `k` must be positive;
/// `limit == 0` means no limit.
pub fn reciprocal_rank_fusion(
    k: f32,
    limit: usize,
    lists: &[Vec<SearchResult>],
) -> Vec<SearchResult> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    let mut chunks: HashMap<String, Chunk> = HashMap::new();

    for list in lists {
        for (rank, result) in list.iter().enumerate() {
            let id = result.chunk.id.clone();
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f32 + 1.0);
            chunks.insert(id, result.chunk.clone());
        }
    }

    let mut results: Vec<SearchResult> = scores
        .into_iter()
        .filter_map(|(id, score)| {
            chunks.remove(&id).map(|chunk| SearchResult { chunk, score })
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
    results
}
