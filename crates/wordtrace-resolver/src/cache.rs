//! In-memory similarity cache.
//!
//! Holds the (id, embedding) projection of the registry in creation order.
//! The registry stays the source of truth: the cache is warmed from it once
//! and rebuilt after `invalidate`.

use tracing::{debug, info};

use wordtrace_storage::{KeywordRegistry, StorageError};
use wordtrace_types::{DimensionMismatch, Embedding};

use crate::similarity::cosine_similarity;

/// Best cache entry for a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheMatch {
    pub id: String,
    pub similarity: f32,
}

/// Linear-scan nearest-neighbor cache over registry embeddings.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    /// None until warmed
    entries: Option<Vec<(String, Embedding)>>,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_warm(&self) -> bool {
        self.entries.is_some()
    }

    /// Load every (id, embedding) pair from the registry.
    ///
    /// No-op when already warm.
    pub fn warm(&mut self, registry: &dyn KeywordRegistry) -> Result<(), StorageError> {
        if self.entries.is_some() {
            return Ok(());
        }
        let entries = registry.list_embeddings()?;
        info!(entries = entries.len(), "Warmed similarity cache");
        self.entries = Some(entries);
        Ok(())
    }

    /// Drop all entries; the next `warm` reloads from the registry.
    pub fn invalidate(&mut self) {
        debug!("Invalidated similarity cache");
        self.entries = None;
    }

    /// Append a newly created keyword.
    ///
    /// Ignored while cold, since the next warm-up reads it from the registry.
    pub fn push(&mut self, id: String, embedding: Embedding) {
        if let Some(entries) = self.entries.as_mut() {
            entries.push((id, embedding));
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .as_ref()
            .is_some_and(|entries| entries.iter().any(|(entry_id, _)| entry_id == id))
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Most similar entry with similarity >= `threshold`.
    ///
    /// Exact ties go to the earliest inserted entry.
    pub fn nearest(
        &self,
        target: &Embedding,
        threshold: f32,
    ) -> Result<Option<CacheMatch>, DimensionMismatch> {
        let Some(entries) = self.entries.as_ref() else {
            return Ok(None);
        };

        let mut best: Option<(usize, f32)> = None;
        for (index, (_, embedding)) in entries.iter().enumerate() {
            let similarity = cosine_similarity(embedding.as_slice(), target.as_slice())?;
            // NaN fails this comparison too
            if !(similarity >= threshold) {
                continue;
            }
            // Strictly greater, so the earlier entry keeps a tie
            if best.map_or(true, |(_, best_sim)| similarity > best_sim) {
                best = Some((index, similarity));
            }
        }

        Ok(best.map(|(index, similarity)| CacheMatch {
            id: entries[index].0.clone(),
            similarity,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm_cache(entries: Vec<(&str, Vec<f32>)>) -> SimilarityCache {
        SimilarityCache {
            entries: Some(
                entries
                    .into_iter()
                    .map(|(id, v)| (id.to_string(), Embedding::new(v)))
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_cold_cache_has_no_match() {
        let cache = SimilarityCache::new();
        assert!(!cache.is_warm());
        assert!(cache
            .nearest(&Embedding::new(vec![1.0, 0.0]), 0.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_push_ignored_while_cold() {
        let mut cache = SimilarityCache::new();
        cache.push("a".to_string(), Embedding::new(vec![1.0]));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_nearest_picks_highest_above_threshold() {
        let cache = warm_cache(vec![
            ("far", vec![0.0, 1.0]),
            ("close", vec![0.9, 0.1]),
            ("closer", vec![1.0, 0.05]),
        ]);
        let hit = cache
            .nearest(&Embedding::new(vec![1.0, 0.0]), 0.85)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "closer");
        assert!(hit.similarity > 0.99);
    }

    #[test]
    fn test_nothing_meets_threshold() {
        let cache = warm_cache(vec![("a", vec![1.0, 0.0])]);
        // similarity 0.5
        let target = Embedding::new(vec![0.5, 0.866_025_4]);
        assert!(cache.nearest(&target, 0.85).unwrap().is_none());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let cache = warm_cache(vec![("a", vec![1.0, 0.0])]);
        let target = Embedding::new(vec![1.0, 0.0]);
        let hit = cache.nearest(&target, 1.0).unwrap().unwrap();
        assert_eq!(hit.id, "a");
        assert_eq!(hit.similarity, 1.0);
    }

    #[test]
    fn test_exact_tie_goes_to_earliest() {
        let cache = warm_cache(vec![
            ("first", vec![2.0, 0.0]),
            ("second", vec![1.0, 0.0]),
            ("third", vec![3.0, 0.0]),
        ]);
        let hit = cache
            .nearest(&Embedding::new(vec![5.0, 0.0]), 0.5)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "first");
    }

    #[test]
    fn test_non_finite_target_never_matches() {
        let cache = warm_cache(vec![("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]);
        let overflowed: Vec<f32> = serde_json::from_str("[1e39, 0.5]").unwrap();
        assert!(overflowed[0].is_infinite());

        assert!(cache
            .nearest(&Embedding::new(overflowed), 0.85)
            .unwrap()
            .is_none());
        assert!(cache
            .nearest(&Embedding::new(vec![f32::NAN, 0.0]), 0.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_nan_entry_does_not_shadow_real_match() {
        let cache = warm_cache(vec![("broken", vec![f32::NAN, 0.0]), ("good", vec![1.0, 0.1])]);
        let hit = cache
            .nearest(&Embedding::new(vec![1.0, 0.0]), 0.85)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "good");
        assert!(hit.similarity.is_finite());
    }

    #[test]
    fn test_dimension_mismatch_surfaces() {
        let cache = warm_cache(vec![("a", vec![1.0, 0.0, 0.0])]);
        assert!(cache.nearest(&Embedding::new(vec![1.0, 0.0]), 0.5).is_err());
    }

    #[test]
    fn test_invalidate() {
        let mut cache = warm_cache(vec![("a", vec![1.0])]);
        assert!(cache.contains("a"));
        cache.invalidate();
        assert!(!cache.is_warm());
        assert!(cache.is_empty());
        assert!(!cache.contains("a"));
    }
}
