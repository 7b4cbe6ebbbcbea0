use grepai_store::SearchResult;
use serde::{Deserialize, Serialize};

/// Structural boosting configuration. Weights are multiplicative; 1.0 is a
/// no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostConfig {
    pub enabled: bool,

    /// Applied when the chunk opens with a definition site (function, type,
    /// class, ...).
    pub definition_weight: f32,

    /// Applied when the chunk starts at the top of its file.
    pub file_head_weight: f32,

    /// Per-path-prefix weights, first match wins.
    #[serde(default)]
    pub path_weights: Vec<PathWeight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathWeight {
    pub prefix: String,
    pub weight: f32,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            definition_weight: 1.15,
            file_head_weight: 1.05,
            path_weights: Vec::new(),
        }
    }
}

/// Apply structural score adjustments and re-rank. The sort is stable, so
/// results that tie after boosting keep their incoming order.
pub fn apply_boost(mut results: Vec<SearchResult>, config: &BoostConfig) -> Vec<SearchResult> {
    if !config.enabled {
        return results;
    }

    for result in &mut results {
        let mut factor = 1.0f32;
        if opens_with_definition(&result.chunk.content) {
            factor *= config.definition_weight;
        }
        if result.chunk.start_line == 1 {
            factor *= config.file_head_weight;
        }
        for path_weight in &config.path_weights {
            if result.chunk.file_path.starts_with(&path_weight.prefix) {
                factor *= path_weight.weight;
                break;
            }
        }
        result.score *= factor;
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

/// Definition keywords across the indexed languages. Leading visibility and
/// async modifiers are skipped before matching.
const DEFINITION_KEYWORDS: &[&str] = &[
    "fn", "func", "def", "class", "type", "struct", "enum", "trait", "interface", "impl",
];

const MODIFIER_KEYWORDS: &[&str] = &["pub", "pub(crate)", "async", "export", "static", "const"];

fn opens_with_definition(content: &str) -> bool {
    let Some(first_line) = content.lines().next() else {
        return false;
    };
    let mut tokens = first_line.split_whitespace().peekable();
    while let Some(token) = tokens.peek() {
        if MODIFIER_KEYWORDS.contains(token) {
            tokens.next();
        } else {
            break;
        }
    }
    tokens
        .next()
        .is_some_and(|token| DEFINITION_KEYWORDS.contains(&token))
}
