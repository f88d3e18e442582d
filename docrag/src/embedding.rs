//! The embedding collaborator used for both chunks and queries.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that turns text into fixed-dimension vectors.
///
/// The pipeline holds an `Option<Arc<dyn EmbeddingProvider>>`; `None` means the
/// embedding credential is not configured, which is known before any call is
/// attempted.
///
/// # Example
///
/// ```rust,ignore
/// use docrag::EmbeddingProvider;
///
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// once per input. Backends with a native batch endpoint override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Embed `texts` and check that the provider returned one vector per input.
pub(crate) async fn embed_all(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>> {
    let embeddings = provider.embed_batch(texts).await?;
    if embeddings.len() != texts.len() {
        return Err(RagError::EmbeddingError {
            provider: provider.name().to_string(),
            message: format!("expected {} embeddings, got {}", texts.len(), embeddings.len()),
        });
    }
    Ok(embeddings)
}
