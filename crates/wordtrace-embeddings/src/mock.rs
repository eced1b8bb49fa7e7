//! Mock embedding provider for testing.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use wordtrace_types::Embedding;

use crate::error::EmbeddingError;
use crate::provider::{EmbeddingProvider, ProviderInfo};

/// Mock provider that returns deterministic vectors.
///
/// Texts registered with `with_vector` get exactly that vector. Any other
/// text gets a pseudo-random vector seeded from the text, so the same text
/// always embeds the same way. Useful for testing without making API calls.
pub struct MockEmbedder {
    info: ProviderInfo,
    vectors: HashMap<String, Vec<f32>>,
    failing: HashSet<String>,
}

impl MockEmbedder {
    /// Create a new mock embedder producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            info: ProviderInfo {
                name: "mock".to_string(),
                model: "mock-embedding".to_string(),
                dimension,
            },
            vectors: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    /// Pin the vector returned for `text`.
    pub fn with_vector(mut self, text: impl Into<String>, values: Vec<f32>) -> Self {
        self.vectors.insert(text.into(), values);
        self
    }

    /// Make every request for `text` fail with an API error.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    fn seeded_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        (0..self.info.dimension)
            .map(|_| rng.random_range(-1.0f32..1.0f32))
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        if self.failing.contains(text) {
            return Err(EmbeddingError::Api(format!("mock failure for {:?}", text)));
        }

        let values = self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.seeded_vector(text));

        let embedding = Embedding::new(values);
        embedding.ensure_dimension(self.info.dimension)?;
        if !embedding.is_finite() {
            return Err(EmbeddingError::Parse(format!(
                "non-finite embedding for {:?}",
                text
            )));
        }
        Ok(embedding)
    }
}
