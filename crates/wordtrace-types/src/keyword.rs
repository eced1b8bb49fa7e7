//! Keyword domain types.
//!
//! A canonical keyword is the single deduplicated record for one real-world
//! person, place, organization or abstract concept. Candidate mentions come
//! from the extraction step and are resolved against the registry into a
//! `ResolutionOutcome`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;
use crate::error::WordTraceError;

/// Top-level keyword kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordType {
    /// Named entity (person, place, organization)
    Entity,
    /// Abstract concept (geopolitics, economic crisis, innovation)
    Concept,
}

impl KeywordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordType::Entity => "entity",
            KeywordType::Concept => "concept",
        }
    }

    /// Categories allowed for this keyword type.
    pub fn categories(&self) -> &'static [KeywordCategory] {
        match self {
            KeywordType::Entity => &[
                KeywordCategory::Person,
                KeywordCategory::Place,
                KeywordCategory::Organization,
            ],
            KeywordType::Concept => &[
                KeywordCategory::Geopolitics,
                KeywordCategory::EconomicCrisis,
                KeywordCategory::Innovation,
            ],
        }
    }
}

impl fmt::Display for KeywordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeywordType {
    type Err = WordTraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entity" => Ok(KeywordType::Entity),
            "concept" => Ok(KeywordType::Concept),
            other => Err(WordTraceError::InvalidInput(format!(
                "unknown keyword type: {}",
                other
            ))),
        }
    }
}

/// Keyword subtype, conditioned on `KeywordType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    Person,
    Place,
    Organization,
    Geopolitics,
    EconomicCrisis,
    Innovation,
}

impl KeywordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordCategory::Person => "person",
            KeywordCategory::Place => "place",
            KeywordCategory::Organization => "organization",
            KeywordCategory::Geopolitics => "geopolitics",
            KeywordCategory::EconomicCrisis => "economic_crisis",
            KeywordCategory::Innovation => "innovation",
        }
    }

    /// The keyword type this category belongs to.
    pub fn keyword_type(&self) -> KeywordType {
        match self {
            KeywordCategory::Person | KeywordCategory::Place | KeywordCategory::Organization => {
                KeywordType::Entity
            }
            KeywordCategory::Geopolitics
            | KeywordCategory::EconomicCrisis
            | KeywordCategory::Innovation => KeywordType::Concept,
        }
    }

    /// Parse a category string and check it belongs to `keyword_type`.
    pub fn parse_for(keyword_type: KeywordType, s: &str) -> Result<Self, WordTraceError> {
        let category: KeywordCategory = s.parse()?;
        if category.keyword_type() != keyword_type {
            return Err(WordTraceError::InvalidInput(format!(
                "category {} is not valid for keyword type {}",
                category, keyword_type
            )));
        }
        Ok(category)
    }
}

impl fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeywordCategory {
    type Err = WordTraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(KeywordCategory::Person),
            "place" => Ok(KeywordCategory::Place),
            "organization" => Ok(KeywordCategory::Organization),
            "geopolitics" => Ok(KeywordCategory::Geopolitics),
            "economic_crisis" => Ok(KeywordCategory::EconomicCrisis),
            "innovation" => Ok(KeywordCategory::Innovation),
            other => Err(WordTraceError::InvalidInput(format!(
                "unknown keyword category: {}",
                other
            ))),
        }
    }
}

/// A canonical keyword stored in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalKeyword {
    /// Unique identifier (ULID), immutable
    pub id: String,
    /// Standardized name
    pub canonical_name: String,
    pub keyword_type: KeywordType,
    pub category: KeywordCategory,
    pub embedding: Embedding,
    /// Alternative surface forms, no exact duplicates
    #[serde(default)]
    pub aliases: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalKeyword {
    /// Check whether `alias` is already recorded (exact match).
    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// An alias is redundant if it equals the canonical name or is already present.
    pub fn is_redundant_alias(&self, alias: &str) -> bool {
        alias == self.canonical_name || self.has_alias(alias)
    }

    /// Serialize to JSON bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A keyword mention extracted from an article, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMention {
    /// Exact surface form as it appeared in the text
    pub name: String,
    /// Suggested normalized form
    pub canonical_name: String,
    pub keyword_type: KeywordType,
    pub category: KeywordCategory,
}

impl CandidateMention {
    pub fn new(
        name: impl Into<String>,
        canonical_name: impl Into<String>,
        keyword_type: KeywordType,
        category: KeywordCategory,
    ) -> Self {
        Self {
            name: name.into(),
            canonical_name: canonical_name.into(),
            keyword_type,
            category,
        }
    }

    /// True when the raw surface form differs from the suggested canonical name.
    pub fn has_distinct_surface_form(&self) -> bool {
        self.name != self.canonical_name
    }
}

/// One article's worth of mentions, in extraction order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleMentions {
    #[serde(default)]
    pub article_id: Option<String>,
    pub keywords: Vec<CandidateMention>,
}

/// Result of resolving one mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    /// The matched or newly created keyword
    pub keyword: CanonicalKeyword,
    pub is_new: bool,
    /// Similarity that triggered the match (None for new keywords)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_similarity: Option<f32>,
}

impl ResolutionOutcome {
    pub fn created(keyword: CanonicalKeyword) -> Self {
        Self {
            keyword,
            is_new: true,
            matched_similarity: None,
        }
    }

    pub fn matched(keyword: CanonicalKeyword, similarity: f32) -> Self {
        Self {
            keyword,
            is_new: false,
            matched_similarity: Some(similarity),
        }
    }

    /// Weight for the article-to-keyword edge: the match similarity, or 1.0
    /// for a keyword created from this mention.
    pub fn edge_weight(&self) -> f32 {
        self.matched_similarity.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_keyword() -> CanonicalKeyword {
        let now = Utc::now();
        CanonicalKeyword {
            id: "01HN4QZQZQZQZQZQZQZQZQZQZQ".to_string(),
            canonical_name: "Donald Trump".to_string(),
            keyword_type: KeywordType::Entity,
            category: KeywordCategory::Person,
            embedding: Embedding::new(vec![0.1, 0.2]),
            aliases: vec!["President Trump".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_category_keyword_type() {
        assert_eq!(KeywordCategory::Person.keyword_type(), KeywordType::Entity);
        assert_eq!(
            KeywordCategory::EconomicCrisis.keyword_type(),
            KeywordType::Concept
        );
        for t in [KeywordType::Entity, KeywordType::Concept] {
            for c in t.categories() {
                assert_eq!(c.keyword_type(), t);
            }
        }
    }

    #[test]
    fn test_parse_for_rejects_cross_type_category() {
        assert_eq!(
            KeywordCategory::parse_for(KeywordType::Concept, "innovation").unwrap(),
            KeywordCategory::Innovation
        );
        assert!(KeywordCategory::parse_for(KeywordType::Concept, "person").is_err());
        assert!(KeywordCategory::parse_for(KeywordType::Entity, "sports").is_err());
    }

    #[test]
    fn test_snake_case_serialization() {
        let json = serde_json::to_string(&KeywordCategory::EconomicCrisis).unwrap();
        assert_eq!(json, "\"economic_crisis\"");
        let mention: CandidateMention = serde_json::from_str(
            r#"{"name":"Trump","canonical_name":"Donald Trump","keyword_type":"entity","category":"person"}"#,
        )
        .unwrap();
        assert_eq!(mention.keyword_type, KeywordType::Entity);
        assert!(mention.has_distinct_surface_form());
    }

    #[test]
    fn test_redundant_alias() {
        let kw = sample_keyword();
        assert!(kw.is_redundant_alias("Donald Trump"));
        assert!(kw.is_redundant_alias("President Trump"));
        assert!(!kw.is_redundant_alias("Trump"));
    }

    #[test]
    fn test_keyword_bytes_roundtrip() {
        let kw = sample_keyword();
        let decoded = CanonicalKeyword::from_bytes(&kw.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, kw);
    }

    #[test]
    fn test_edge_weight() {
        let kw = sample_keyword();
        assert_eq!(ResolutionOutcome::created(kw.clone()).edge_weight(), 1.0);
        assert_eq!(ResolutionOutcome::matched(kw, 0.92).edge_weight(), 0.92);
    }

    #[test]
    fn test_article_mentions_default_article_id() {
        let batch: ArticleMentions = serde_json::from_str(r#"{"keywords":[]}"#).unwrap();
        assert!(batch.article_id.is_none());
        assert!(batch.keywords.is_empty());
    }
}
