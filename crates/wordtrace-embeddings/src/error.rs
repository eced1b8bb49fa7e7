//! Embedding error types.

use thiserror::Error;
use wordtrace_types::DimensionMismatch;

/// Errors that can occur while acquiring embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// API request failed (network, non-success status)
    #[error("API request failed: {0}")]
    Api(String),

    /// Provider returned HTTP 429
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Response body could not be interpreted
    #[error("Failed to parse API response: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Empty batch or empty text
    #[error("Empty input")]
    EmptyInput,

    /// Batch response was missing an entry
    #[error("Missing embedding for index {0}")]
    MissingIndex(usize),

    /// Batch response referenced an index outside the request
    #[error("Unexpected embedding index {index} for batch size {batch_size}")]
    UnexpectedIndex { index: usize, batch_size: usize },

    /// Returned vector does not have the configured dimension
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),
}
