//! # wordtrace-resolver
//!
//! Similarity-based identity resolution for keyword mentions.
//!
//! A mention whose canonical name embeds close enough to an existing keyword
//! (cosine similarity at or above the threshold) is folded into that keyword
//! as an alias; otherwise a new canonical keyword is created.
//!
//! ## Components
//! - `similarity`: cosine similarity with a zero-vector policy
//! - `cache`: in-memory (id, embedding) projection with deterministic lookup
//! - `resolver`: the match-or-create orchestration

pub mod cache;
pub mod error;
pub mod resolver;
pub mod similarity;

pub use cache::{CacheMatch, SimilarityCache};
pub use error::ResolverError;
pub use resolver::{process_article_keywords, IdentityResolver};
pub use similarity::cosine_similarity;
