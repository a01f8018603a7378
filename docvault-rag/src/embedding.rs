//! The embedder seam: text in, fixed-size vectors out.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Maps chunk and query text into the vector space a collection is searched in.
///
/// Implementations must be deterministic: the same text with the same
/// configuration always yields the same vector. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially; backends that support
/// native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docvault_rag::{EmbeddingProvider, HashEmbeddingProvider};
///
/// let provider = HashEmbeddingProvider::new(384);
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, one vector per input in input order.
    ///
    /// Must be element-wise equal to calling [`embed`](EmbeddingProvider::embed)
    /// on each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;

    /// A short label for logs and error messages (usually the model id).
    fn name(&self) -> &str;
}

/// Check that a batch response has one vector per input, each of the expected size.
pub(crate) fn check_batch(
    provider: &dyn EmbeddingProvider,
    inputs: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != inputs {
        return Err(RagError::embedding(
            provider.name(),
            format!("malformed output: expected {inputs} vectors, got {}", embeddings.len()),
        ));
    }
    let expected = provider.dimensions();
    if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
        return Err(RagError::embedding(
            provider.name(),
            format!("malformed output: expected {expected} dimensions, got {}", bad.len()),
        ));
    }
    Ok(())
}
