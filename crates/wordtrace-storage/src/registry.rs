//! Registry trait consumed by the identity resolver.
//!
//! The resolver depends on this trait rather than on `Storage` so that
//! alternative backends can be substituted in tests.

use wordtrace_types::{CanonicalKeyword, Embedding, KeywordCategory, KeywordType};

use crate::db::Storage;
use crate::error::StorageError;

/// Fields for a keyword that has not been persisted yet.
///
/// The id and timestamps are assigned by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKeyword {
    pub canonical_name: String,
    pub keyword_type: KeywordType,
    pub category: KeywordCategory,
    pub embedding: Embedding,
    /// Initial aliases. Duplicates and the canonical name itself are dropped.
    pub aliases: Vec<String>,
}

/// Durable store of canonical keywords.
pub trait KeywordRegistry: Send + Sync {
    /// Persist a new keyword and return it with its assigned id.
    fn create_keyword(&self, new: NewKeyword) -> Result<CanonicalKeyword, StorageError>;

    /// Fetch a keyword by id.
    fn get_keyword(&self, id: &str) -> Result<Option<CanonicalKeyword>, StorageError>;

    /// Fetch a keyword by exact canonical name.
    fn get_keyword_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<CanonicalKeyword>, StorageError>;

    /// Every (id, embedding) pair, in creation order.
    fn list_embeddings(&self) -> Result<Vec<(String, Embedding)>, StorageError>;

    /// Add an alias. Returns whether the alias list changed.
    fn add_alias(&self, id: &str, alias: &str) -> Result<bool, StorageError>;
}

impl KeywordRegistry for Storage {
    fn create_keyword(&self, new: NewKeyword) -> Result<CanonicalKeyword, StorageError> {
        Storage::create_keyword(self, new)
    }

    fn get_keyword(&self, id: &str) -> Result<Option<CanonicalKeyword>, StorageError> {
        Storage::get_keyword(self, id)
    }

    fn get_keyword_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<CanonicalKeyword>, StorageError> {
        Storage::get_keyword_by_name(self, canonical_name)
    }

    fn list_embeddings(&self) -> Result<Vec<(String, Embedding)>, StorageError> {
        self.list_keyword_embeddings()
    }

    fn add_alias(&self, id: &str, alias: &str) -> Result<bool, StorageError> {
        Storage::add_alias(self, id, alias)
    }
}
