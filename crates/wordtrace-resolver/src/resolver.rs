//! Identity resolver: match-or-create for candidate mentions.
//!
//! For each mention, in input order:
//! 1. Warm the similarity cache (once per resolver unless invalidated)
//! 2. Embed the mention's canonical name
//! 3. Look up the nearest cached keyword at the threshold
//! 4. On a hit, fetch the keyword and fold the mention's surface forms into its aliases
//! 5. On a miss, create a keyword and append it to the cache

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use wordtrace_embeddings::{EmbeddingError, EmbeddingProvider};
use wordtrace_storage::{KeywordRegistry, NewKeyword, StorageError};
use wordtrace_types::{
    CandidateMention, CanonicalKeyword, Embedding, ResolutionOutcome, ResolverSettings,
};

use crate::cache::SimilarityCache;
use crate::error::ResolverError;
use crate::similarity::cosine_similarity;

/// Resolves candidate mentions against the canonical registry.
///
/// Owns its similarity cache. Mentions must be resolved one at a time, so
/// all resolving methods take `&mut self`.
pub struct IdentityResolver {
    embedder: Arc<dyn EmbeddingProvider>,
    registry: Arc<dyn KeywordRegistry>,
    threshold: f32,
    cache: SimilarityCache,
}

impl IdentityResolver {
    /// Create a resolver. Fails if `threshold` is outside [0.0, 1.0].
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        registry: Arc<dyn KeywordRegistry>,
        threshold: f32,
    ) -> Result<Self, ResolverError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ResolverError::InvalidConfiguration(format!(
                "similarity threshold must be within 0.0-1.0, got {}",
                threshold
            )));
        }

        Ok(Self {
            embedder,
            registry,
            threshold,
            cache: SimilarityCache::new(),
        })
    }

    /// Create a resolver from loaded settings.
    pub fn from_settings(
        embedder: Arc<dyn EmbeddingProvider>,
        registry: Arc<dyn KeywordRegistry>,
        settings: &ResolverSettings,
    ) -> Result<Self, ResolverError> {
        Self::new(embedder, registry, settings.similarity_threshold)
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Number of cached (id, embedding) pairs; 0 while cold.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Load the cache from the registry if it is not already warm.
    pub fn warm_cache(&mut self) -> Result<(), ResolverError> {
        self.cache.warm(self.registry.as_ref())?;
        Ok(())
    }

    /// Forget cached entries, e.g. after another writer changed the registry.
    pub fn invalidate_cache(&mut self) {
        self.cache.invalidate();
    }

    /// Resolve a single mention.
    #[instrument(skip(self, mention), fields(name = %mention.name, canonical_name = %mention.canonical_name))]
    pub async fn resolve(
        &mut self,
        mention: &CandidateMention,
    ) -> Result<ResolutionOutcome, ResolverError> {
        self.warm_cache()?;
        let embedding = self.embedder.embed(&mention.canonical_name).await?;
        self.resolve_embedded(mention, embedding)
    }

    /// Resolve an article's mentions in order, stopping at the first failure.
    ///
    /// All canonical names are embedded in one provider call before any
    /// registry change, so a provider failure leaves the registry untouched.
    /// Each mention still sees the keywords created by the ones before it.
    #[instrument(skip(self, mentions), fields(count = mentions.len()))]
    pub async fn resolve_batch(
        &mut self,
        mentions: &[CandidateMention],
    ) -> Result<Vec<ResolutionOutcome>, ResolverError> {
        if mentions.is_empty() {
            return Ok(Vec::new());
        }

        self.warm_cache()?;

        let texts: Vec<&str> = mentions.iter().map(|m| m.canonical_name.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != mentions.len() {
            return Err(ResolverError::Provider(EmbeddingError::Parse(format!(
                "expected {} embeddings, got {}",
                mentions.len(),
                embeddings.len()
            ))));
        }

        let mut outcomes = Vec::with_capacity(mentions.len());
        for (mention, embedding) in mentions.iter().zip(embeddings) {
            outcomes.push(self.resolve_embedded(mention, embedding)?);
        }

        let created = outcomes.iter().filter(|o| o.is_new).count();
        info!(
            resolved = outcomes.len(),
            created = created,
            "Resolved mention batch"
        );
        Ok(outcomes)
    }

    /// Resolve mentions in order, continuing past failures.
    ///
    /// Returns one result per mention, in input order.
    pub async fn resolve_each(
        &mut self,
        mentions: &[CandidateMention],
    ) -> Vec<Result<ResolutionOutcome, ResolverError>> {
        let mut results = Vec::with_capacity(mentions.len());
        for mention in mentions {
            let result = self.resolve(mention).await;
            if let Err(e) = &result {
                warn!(name = %mention.name, error = %e, "Failed to resolve mention");
            }
            results.push(result);
        }
        results
    }

    fn resolve_embedded(
        &mut self,
        mention: &CandidateMention,
        embedding: Embedding,
    ) -> Result<ResolutionOutcome, ResolverError> {
        if embedding.is_zero() {
            debug!(name = %mention.canonical_name, "Zero embedding, every similarity is 0");
        }

        match self.cache.nearest(&embedding, self.threshold)? {
            Some(hit) => {
                let keyword = self
                    .registry
                    .get_keyword(&hit.id)?
                    .ok_or_else(|| ResolverError::StaleCacheReference(hit.id.clone()))?;

                debug!(id = %keyword.id, similarity = hit.similarity, "Matched existing keyword");
                let keyword = self.merge_aliases(keyword, mention)?;
                Ok(ResolutionOutcome::matched(keyword, hit.similarity))
            }
            None => self.create(mention, embedding),
        }
    }

    fn create(
        &mut self,
        mention: &CandidateMention,
        embedding: Embedding,
    ) -> Result<ResolutionOutcome, ResolverError> {
        let aliases = if mention.has_distinct_surface_form() {
            vec![mention.name.clone()]
        } else {
            Vec::new()
        };

        let new = NewKeyword {
            canonical_name: mention.canonical_name.clone(),
            keyword_type: mention.keyword_type,
            category: mention.category,
            embedding: embedding.clone(),
            aliases,
        };

        match self.registry.create_keyword(new) {
            Ok(keyword) => {
                info!(id = %keyword.id, canonical_name = %keyword.canonical_name, "Created keyword");
                self.cache.push(keyword.id.clone(), keyword.embedding.clone());
                Ok(ResolutionOutcome::created(keyword))
            }
            Err(StorageError::DuplicateCanonicalName { existing_id, .. }) => {
                self.merge_into_existing(mention, &embedding, &existing_id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// The name was taken by a keyword the cache did not match: fold the
    /// mention into that row instead of creating a second one.
    fn merge_into_existing(
        &mut self,
        mention: &CandidateMention,
        embedding: &Embedding,
        existing_id: &str,
    ) -> Result<ResolutionOutcome, ResolverError> {
        let keyword = self.registry.get_keyword(existing_id)?.ok_or_else(|| {
            ResolverError::Registry(StorageError::Inconsistent(format!(
                "name index points at unknown keyword {}",
                existing_id
            )))
        })?;

        let similarity = cosine_similarity(embedding.as_slice(), keyword.embedding.as_slice())?;
        warn!(
            id = %keyword.id,
            similarity = similarity,
            "Canonical name already registered, merging into existing keyword"
        );

        if !self.cache.contains(&keyword.id) {
            self.cache.push(keyword.id.clone(), keyword.embedding.clone());
        }

        let keyword = self.merge_aliases(keyword, mention)?;
        Ok(ResolutionOutcome::matched(keyword, similarity))
    }

    /// Add the mention's raw name and suggested canonical name as aliases
    /// where they differ from the keyword's canonical name.
    ///
    /// Returns the keyword as stored after the update.
    fn merge_aliases(
        &self,
        keyword: CanonicalKeyword,
        mention: &CandidateMention,
    ) -> Result<CanonicalKeyword, ResolverError> {
        let mut changed = false;
        for alias in [&mention.name, &mention.canonical_name] {
            if keyword.is_redundant_alias(alias) {
                continue;
            }
            if self.registry.add_alias(&keyword.id, alias)? {
                debug!(id = %keyword.id, alias = %alias, "Added alias");
                changed = true;
            }
        }

        if !changed {
            return Ok(keyword);
        }
        self.registry
            .get_keyword(&keyword.id)?
            .ok_or(ResolverError::NotFound(keyword.id))
    }
}

/// Resolve one article's mentions with a fresh resolver.
pub async fn process_article_keywords(
    embedder: Arc<dyn EmbeddingProvider>,
    registry: Arc<dyn KeywordRegistry>,
    mentions: &[CandidateMention],
    threshold: f32,
) -> Result<Vec<ResolutionOutcome>, ResolverError> {
    let mut resolver = IdentityResolver::new(embedder, registry, threshold)?;
    resolver.resolve_batch(mentions).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wordtrace_embeddings::MockEmbedder;
    use wordtrace_storage::Storage;
    use wordtrace_types::{KeywordCategory, KeywordType};

    const E1: [f32; 2] = [1.0, 0.0];
    // cosine with E1 is 0.92
    const E2: [f32; 2] = [0.92, 0.391_918];

    fn open_storage() -> (Arc<Storage>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::open(temp_dir.path()).unwrap());
        (storage, temp_dir)
    }

    fn resolver(embedder: MockEmbedder, storage: &Arc<Storage>) -> IdentityResolver {
        IdentityResolver::new(Arc::new(embedder), storage.clone(), 0.85).unwrap()
    }

    fn org(name: &str, canonical: &str) -> CandidateMention {
        CandidateMention::new(
            name,
            canonical,
            KeywordType::Entity,
            KeywordCategory::Organization,
        )
    }

    fn person(name: &str, canonical: &str) -> CandidateMention {
        CandidateMention::new(name, canonical, KeywordType::Entity, KeywordCategory::Person)
    }

    #[test]
    fn test_threshold_validated_at_construction() {
        let (storage, _temp) = open_storage();
        for bad in [-0.01, 1.01, f32::NAN] {
            let result = IdentityResolver::new(Arc::new(MockEmbedder::new(2)), storage.clone(), bad);
            assert!(matches!(
                result,
                Err(ResolverError::InvalidConfiguration(_))
            ));
        }
        let ok = IdentityResolver::new(Arc::new(MockEmbedder::new(2)), storage.clone(), 1.0);
        assert_eq!(ok.unwrap().threshold(), 1.0);
    }

    #[tokio::test]
    async fn test_first_mention_creates_without_alias() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(2).with_vector("Tesla", E1.to_vec()), &storage);

        let outcome = resolver.resolve(&org("Tesla", "Tesla")).await.unwrap();
        assert!(outcome.is_new);
        assert!(outcome.matched_similarity.is_none());
        assert!(outcome.keyword.aliases.is_empty());
        assert_eq!(resolver.cache_len(), 1);
    }

    #[tokio::test]
    async fn test_zero_embedding_never_matches() {
        let (storage, _temp) = open_storage();
        let embedder = MockEmbedder::new(2)
            .with_vector("Tesla", E1.to_vec())
            .with_vector("Nothing", vec![0.0, 0.0]);
        let mut resolver = resolver(embedder, &storage);

        resolver.resolve(&org("Tesla", "Tesla")).await.unwrap();
        let outcome = resolver.resolve(&org("Nothing", "Nothing")).await.unwrap();
        assert!(outcome.is_new);
        assert_eq!(storage.keyword_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_similar_mention_matches_and_adds_alias_once() {
        let (storage, _temp) = open_storage();
        let created = resolver(MockEmbedder::new(2).with_vector("Tesla", E1.to_vec()), &storage)
            .resolve(&org("Tesla", "Tesla"))
            .await
            .unwrap();

        // A later run embeds the same name slightly differently
        let mut later = resolver(MockEmbedder::new(2).with_vector("Tesla", E2.to_vec()), &storage);
        let outcome = later.resolve(&org("Tesla Inc.", "Tesla")).await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.keyword.id, created.keyword.id);
        assert!((outcome.matched_similarity.unwrap() - 0.92).abs() < 1e-4);
        assert_eq!(outcome.keyword.aliases, vec!["Tesla Inc.".to_string()]);

        let again = later.resolve(&org("Tesla Inc.", "Tesla")).await.unwrap();
        assert!(!again.is_new);
        assert_eq!(again.keyword.aliases.len(), 1);

        let stored = storage.get_keyword(&created.keyword.id).unwrap().unwrap();
        assert_eq!(stored.aliases, vec!["Tesla Inc.".to_string()]);
        assert_eq!(storage.keyword_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_folds_near_duplicates_into_first() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(16), &storage);

        let outcomes = resolver
            .resolve_batch(&[
                person("President Trump", "Donald Trump"),
                person("Trump", "Donald Trump"),
            ])
            .await
            .unwrap();

        assert!(outcomes[0].is_new);
        assert!(!outcomes[1].is_new);
        assert_eq!(outcomes[0].keyword.id, outcomes[1].keyword.id);
        assert_eq!(
            outcomes[1].keyword.aliases,
            vec!["President Trump".to_string(), "Trump".to_string()]
        );
        assert_eq!(storage.keyword_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_matches_against_earlier_mention_with_other_name() {
        let (storage, _temp) = open_storage();
        let embedder = MockEmbedder::new(2)
            .with_vector("Donald Trump", E1.to_vec())
            // similarity 0.9
            .with_vector("Donald J. Trump", vec![0.9, 0.435_889_9]);
        let mut resolver = resolver(embedder, &storage);

        let outcomes = resolver
            .resolve_batch(&[
                person("President Trump", "Donald Trump"),
                person("Trump", "Donald J. Trump"),
            ])
            .await
            .unwrap();

        assert!(outcomes[0].is_new);
        assert!(!outcomes[1].is_new);
        assert_eq!(outcomes[1].keyword.id, outcomes[0].keyword.id);
        assert!((outcomes[1].matched_similarity.unwrap() - 0.9).abs() < 1e-4);
        assert_eq!(
            outcomes[1].keyword.aliases,
            vec![
                "President Trump".to_string(),
                "Trump".to_string(),
                "Donald J. Trump".to_string(),
            ]
        );
        assert_eq!(storage.keyword_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_matched_keyword_reflects_stored_row() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(
            MockEmbedder::new(2)
                .with_vector("Tesla", E1.to_vec())
                .with_vector("Tesla Motors", E2.to_vec()),
            &storage,
        );

        let created = resolver.resolve(&org("Tesla", "Tesla")).await.unwrap();
        let matched = resolver
            .resolve(&org("Tesla Motors", "Tesla Motors"))
            .await
            .unwrap();
        assert!(!matched.is_new);

        let stored = storage.get_keyword(&created.keyword.id).unwrap().unwrap();
        assert_eq!(matched.keyword, stored);
        assert!(matched.keyword.updated_at >= created.keyword.updated_at);

        // Nothing new to add, so the row is left alone
        let repeat = resolver
            .resolve(&org("Tesla Motors", "Tesla Motors"))
            .await
            .unwrap();
        assert_eq!(repeat.keyword, stored);
    }

    #[tokio::test]
    async fn test_dissimilar_mentions_get_distinct_ids() {
        let (storage, _temp) = open_storage();
        let embedder = MockEmbedder::new(2)
            .with_vector("Apple", vec![1.0, 0.0])
            // similarity 0.5
            .with_vector("Angela Merkel", vec![0.5, 0.866_025_4]);
        let mut resolver = resolver(embedder, &storage);

        let a = resolver.resolve(&org("Apple", "Apple")).await.unwrap();
        let b = resolver
            .resolve(&person("Merkel", "Angela Merkel"))
            .await
            .unwrap();
        assert!(a.is_new && b.is_new);
        assert_ne!(a.keyword.id, b.keyword.id);
        assert_eq!(b.keyword.aliases, vec!["Merkel".to_string()]);
    }

    #[tokio::test]
    async fn test_exact_threshold_requires_identical_embedding() {
        let (storage, _temp) = open_storage();
        let embedder = MockEmbedder::new(2)
            .with_vector("Tesla", vec![1.0, 0.0])
            .with_vector("Tesla Motors", vec![1.0, 0.001])
            .with_vector("Tesla Inc", vec![2.0, 0.0]);
        let mut resolver =
            IdentityResolver::new(Arc::new(embedder), storage.clone(), 1.0).unwrap();

        resolver.resolve(&org("Tesla", "Tesla")).await.unwrap();
        let perturbed = resolver
            .resolve(&org("Tesla Motors", "Tesla Motors"))
            .await
            .unwrap();
        assert!(perturbed.is_new);

        let same_direction = resolver
            .resolve(&org("Tesla Inc", "Tesla Inc"))
            .await
            .unwrap();
        assert!(!same_direction.is_new);
        assert_eq!(same_direction.keyword.canonical_name, "Tesla");
        assert_eq!(same_direction.keyword.aliases, vec!["Tesla Inc".to_string()]);
    }

    #[tokio::test]
    async fn test_provider_failure_in_batch_leaves_registry_untouched() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(4).failing_on("Broken"), &storage);

        let err = resolver
            .resolve_batch(&[org("Fine", "Fine"), org("Broken", "Broken")])
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::Provider(_)));
        assert!(!err.is_fatal());
        assert_eq!(storage.keyword_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolve_each_skips_failures() {
        let (storage, _temp) = open_storage();
        let embedder = MockEmbedder::new(2)
            .with_vector("Tesla", vec![1.0, 0.0])
            .with_vector("NATO", vec![0.0, 1.0])
            .failing_on("Broken");
        let mut resolver = resolver(embedder, &storage);

        let results = resolver
            .resolve_each(&[org("Tesla", "Tesla"), org("Broken", "Broken"), org("NATO", "NATO")])
            .await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ResolverError::Provider(_))));
        assert!(results[2].as_ref().unwrap().is_new);
        assert_eq!(storage.keyword_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_name_collision_merges_into_existing_row() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(2).with_vector("Tesla", E1.to_vec()), &storage);
        resolver.warm_cache().unwrap();

        // Another writer registers the name after our cache warmed
        let existing = storage
            .create_keyword(NewKeyword {
                canonical_name: "Tesla".to_string(),
                keyword_type: KeywordType::Entity,
                category: KeywordCategory::Organization,
                embedding: Embedding::new(vec![0.0, 1.0]),
                aliases: Vec::new(),
            })
            .unwrap();

        let outcome = resolver.resolve(&org("Tesla Inc.", "Tesla")).await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.keyword.id, existing.id);
        assert_eq!(outcome.matched_similarity, Some(0.0));
        assert_eq!(outcome.keyword.aliases, vec!["Tesla Inc.".to_string()]);
        assert_eq!(resolver.cache_len(), 1);
        assert_eq!(storage.keyword_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_picks_up_other_writers() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(2).with_vector("NATO", vec![0.0, 1.0]), &storage);
        resolver.warm_cache().unwrap();
        assert_eq!(resolver.cache_len(), 0);

        storage
            .create_keyword(NewKeyword {
                canonical_name: "North Atlantic Treaty Organization".to_string(),
                keyword_type: KeywordType::Entity,
                category: KeywordCategory::Organization,
                embedding: Embedding::new(vec![0.0, 1.0]),
                aliases: Vec::new(),
            })
            .unwrap();

        resolver.invalidate_cache();
        let outcome = resolver.resolve(&org("NATO", "NATO")).await.unwrap();
        assert!(!outcome.is_new);
        assert_eq!(
            outcome.keyword.canonical_name,
            "North Atlantic Treaty Organization"
        );
        assert_eq!(outcome.keyword.aliases, vec!["NATO".to_string()]);
    }

    /// Registry whose listing names an id that can no longer be fetched.
    struct StaleRegistry {
        listed: Vec<(String, Embedding)>,
    }

    impl KeywordRegistry for StaleRegistry {
        fn create_keyword(&self, _new: NewKeyword) -> Result<CanonicalKeyword, StorageError> {
            unreachable!("stale registry never creates")
        }

        fn get_keyword(&self, _id: &str) -> Result<Option<CanonicalKeyword>, StorageError> {
            Ok(None)
        }

        fn get_keyword_by_name(
            &self,
            _canonical_name: &str,
        ) -> Result<Option<CanonicalKeyword>, StorageError> {
            Ok(None)
        }

        fn list_embeddings(&self) -> Result<Vec<(String, Embedding)>, StorageError> {
            Ok(self.listed.clone())
        }

        fn add_alias(&self, id: &str, _alias: &str) -> Result<bool, StorageError> {
            Err(StorageError::NotFound(id.to_string()))
        }
    }

    #[tokio::test]
    async fn test_stale_cache_reference_is_fatal() {
        let registry = Arc::new(StaleRegistry {
            listed: vec![("ghost".to_string(), Embedding::new(vec![1.0, 0.0]))],
        });
        let embedder = MockEmbedder::new(2).with_vector("Tesla", vec![1.0, 0.0]);
        let mut resolver = IdentityResolver::new(Arc::new(embedder), registry, 0.85).unwrap();

        let err = resolver.resolve(&org("Tesla", "Tesla")).await.unwrap_err();
        assert!(matches!(err, ResolverError::StaleCacheReference(ref id) if id == "ghost"));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_process_article_keywords() {
        let (storage, _temp) = open_storage();
        let outcomes = process_article_keywords(
            Arc::new(MockEmbedder::new(8)),
            storage.clone(),
            &[person("Merkel", "Angela Merkel"), person("Angela Merkel", "Angela Merkel")],
            0.85,
        )
        .await
        .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].edge_weight(), 1.0);
        assert!(!outcomes[1].is_new);
        assert_eq!(outcomes[1].keyword.aliases, vec!["Merkel".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let (storage, _temp) = open_storage();
        let mut resolver = resolver(MockEmbedder::new(2), &storage);
        assert!(resolver.resolve_batch(&[]).await.unwrap().is_empty());
    }
}
