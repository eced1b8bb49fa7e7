//! End-to-end test infrastructure for WordTrace.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering mention resolution against a real RocksDB registry.

use std::sync::Arc;

use tempfile::TempDir;

use wordtrace_embeddings::MockEmbedder;
use wordtrace_resolver::IdentityResolver;
use wordtrace_storage::Storage;
use wordtrace_types::{CandidateMention, KeywordCategory, KeywordType};

/// Default threshold used by the harness resolvers.
pub const DEFAULT_THRESHOLD: f32 = 0.85;

/// Shared test harness for E2E tests.
///
/// Owns a temporary registry directory and the storage opened on it.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: TempDir,
    /// Shared storage instance
    pub storage: Arc<Storage>,
}

impl TestHarness {
    /// Create a new test harness with temp directory and storage.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));

        Self {
            _temp_dir: temp_dir,
            storage,
        }
    }

    /// Close and reopen the registry on the same directory.
    ///
    /// Every resolver built from this harness must be dropped first, since
    /// RocksDB holds an exclusive lock while any handle is alive.
    pub fn reopen(self) -> Self {
        let TestHarness { _temp_dir, storage } = self;
        drop(storage);
        let storage =
            Arc::new(Storage::open(_temp_dir.path()).expect("Failed to reopen test storage"));
        Self { _temp_dir, storage }
    }

    /// Build a resolver over this harness's registry.
    pub fn resolver(&self, embedder: MockEmbedder) -> IdentityResolver {
        self.resolver_with_threshold(embedder, DEFAULT_THRESHOLD)
    }

    /// Build a resolver with an explicit threshold.
    pub fn resolver_with_threshold(
        &self,
        embedder: MockEmbedder,
        threshold: f32,
    ) -> IdentityResolver {
        IdentityResolver::new(Arc::new(embedder), self.storage.clone(), threshold)
            .expect("Failed to create resolver")
    }

    /// Number of canonical keywords in the registry.
    pub fn keyword_count(&self) -> u64 {
        self.storage
            .keyword_count()
            .expect("Failed to count keywords")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Two-dimensional unit vector whose cosine similarity with `[1.0, 0.0]`
/// is `similarity`.
pub fn vector_with_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

/// Person mention.
pub fn person(name: &str, canonical_name: &str) -> CandidateMention {
    CandidateMention::new(name, canonical_name, KeywordType::Entity, KeywordCategory::Person)
}

/// Organization mention.
pub fn organization(name: &str, canonical_name: &str) -> CandidateMention {
    CandidateMention::new(
        name,
        canonical_name,
        KeywordType::Entity,
        KeywordCategory::Organization,
    )
}

/// Concept mention.
pub fn concept(name: &str, canonical_name: &str, category: KeywordCategory) -> CandidateMention {
    CandidateMention::new(name, canonical_name, KeywordType::Concept, category)
}
