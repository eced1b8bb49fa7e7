//! Embedding provider trait.
//!
//! Defines the interface for turning keyword text into vectors.

use async_trait::async_trait;
use wordtrace_types::Embedding;

use crate::error::EmbeddingError;

/// Provider information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name (e.g., "gemini", "mock")
    pub name: String,
    /// Model name
    pub model: String,
    /// Embedding dimension every returned vector must have
    pub dimension: usize,
}

/// Trait for embedding providers.
///
/// Implementations must be thread-safe (Send + Sync). Every vector handed
/// back has `info().dimension` components.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Get provider information
    fn info(&self) -> &ProviderInfo;

    /// Generate embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Generate embeddings for multiple texts, same length and order as the input.
    /// Default implementation calls embed() for each text.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}
