//! Embedding providers for grepai.
//!
//! The search core only depends on the [`Embedder`] contract: text in, a
//! vector of the declared dimension out. Concrete providers talk to
//! Ollama-compatible or OpenAI-compatible HTTP endpoints; [`StubEmbedder`]
//! produces deterministic vectors for tests and offline development.

mod error;
mod ollama;
mod openai;
mod stub;

pub use error::{EmbedError, Result};
pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;
pub use stub::StubEmbedder;

use async_trait::async_trait;

/// Maps text to a fixed-dimensional vector. Every returned vector has length
/// `dimensions()`; providers check and fail loudly rather than letting a
/// wrong-sized vector reach the store.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimensions(&self) -> usize;

    /// Release provider resources. HTTP providers have nothing to flush, but
    /// the contract keeps the seam uniform for pooled backends.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn check_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() != expected {
        return Err(EmbedError::Dimension {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}
