//! # wordtrace-types
//!
//! Shared domain types for the WordTrace keyword registry.
//!
//! This crate defines the data structures passed between the registry,
//! the embedding providers and the identity resolver:
//! - Keywords: canonical entities/concepts with embeddings and aliases
//! - Mentions: candidate surface forms handed over by extraction
//! - Outcomes: the match-or-create result for each mention
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use wordtrace_types::{CandidateMention, KeywordCategory, KeywordType};
//!
//! let mention = CandidateMention::new(
//!     "Tesla Inc.",
//!     "Tesla",
//!     KeywordType::Entity,
//!     KeywordCategory::Organization,
//! );
//! assert!(mention.has_distinct_surface_form());
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod keyword;

pub use config::{EmbeddingSettings, ResolverSettings, Settings};
pub use embedding::{DimensionMismatch, Embedding};
pub use error::WordTraceError;
pub use keyword::{
    ArticleMentions, CandidateMention, CanonicalKeyword, KeywordCategory, KeywordType,
    ResolutionOutcome,
};
