use crate::error::Result;
use crate::{check_dimension, Embedder};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Deterministic embedder for tests and offline development. Equal text
/// always embeds to the same unit vector, and texts sharing tokens land
/// closer together than unrelated ones, which is enough signal for ranking
/// tests without a model server.
pub struct StubEmbedder {
    dimensions: usize,
}

impl StubEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            for (i, pair) in digest.chunks(2).enumerate() {
                let slot = (usize::from(pair[0]) * 256 + usize::from(pair[1]) + i)
                    % self.dimensions;
                vector[slot] += 1.0;
            }
        }
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vector = self.embed_text(text);
        check_dimension(&vector, self.dimensions)?;
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| Ok(self.embed_text(t))).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
