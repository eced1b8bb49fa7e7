//! Resolver error types.

use thiserror::Error;
use wordtrace_embeddings::EmbeddingError;
use wordtrace_storage::StorageError;
use wordtrace_types::DimensionMismatch;

/// Errors surfaced by identity resolution.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Embedding acquisition failed
    #[error("Embedding provider error: {0}")]
    Provider(#[from] EmbeddingError),

    /// Vectors of different lengths met; the registry or provider is misconfigured
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatch),

    /// The cache matched an id the registry does not have
    #[error("Similarity cache references unknown keyword {0}")]
    StaleCacheReference(String),

    /// Keyword not found
    #[error("Keyword not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(StorageError),
}

impl ResolverError {
    /// Consistency failures that mean the registry or cache can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        match self {
            ResolverError::DimensionMismatch(_) | ResolverError::StaleCacheReference(_) => true,
            ResolverError::Provider(EmbeddingError::Dimension(_)) => true,
            ResolverError::Registry(StorageError::Inconsistent(_)) => true,
            _ => false,
        }
    }
}

impl From<StorageError> for ResolverError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ResolverError::NotFound(id),
            StorageError::Dimension(mismatch) => ResolverError::DimensionMismatch(mismatch),
            other => ResolverError::Registry(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_taxonomy() {
        let err: ResolverError = StorageError::NotFound("abc".to_string()).into();
        assert!(matches!(err, ResolverError::NotFound(ref id) if id == "abc"));
        assert!(!err.is_fatal());

        let mismatch = DimensionMismatch {
            expected: 3,
            actual: 2,
        };
        let err: ResolverError = StorageError::Dimension(mismatch).into();
        assert!(matches!(err, ResolverError::DimensionMismatch(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_provider_errors_are_recoverable() {
        let err: ResolverError = EmbeddingError::RateLimitExceeded.into();
        assert!(!err.is_fatal());
        assert!(ResolverError::StaleCacheReference("x".to_string()).is_fatal());
    }
}
