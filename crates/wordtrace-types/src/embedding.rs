//! Fixed-dimension embedding vectors.
//!
//! Every registry instance holds embeddings of a single dimension. The
//! dimension is checked whenever a vector crosses a boundary (provider
//! output, registry read, cache lookup) so that a mismatch surfaces as a
//! `DimensionMismatch` instead of a silently wrong similarity.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two vectors that were expected to share a dimension do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Dimension mismatch: expected {expected}, got {actual}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Embedding vector as returned by the provider. Not normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Get the embedding dimension
    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// True when no component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Check this vector against the dimension fixed for a registry or provider.
    pub fn ensure_dimension(&self, expected: usize) -> Result<(), DimensionMismatch> {
        if self.dimension() == expected {
            Ok(())
        } else {
            Err(DimensionMismatch {
                expected,
                actual: self.dimension(),
            })
        }
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
