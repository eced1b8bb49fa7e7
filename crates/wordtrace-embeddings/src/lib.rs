//! # wordtrace-embeddings
//!
//! Embedding providers for WordTrace keyword matching.
//!
//! The identity resolver consumes embeddings through the `EmbeddingProvider`
//! trait and never retries on its own; any retry policy lives in the provider
//! configuration or with the caller.
//!
//! ## Providers
//! - `ApiEmbedder`: Gemini and OpenAI-compatible HTTP endpoints
//! - `MockEmbedder`: deterministic vectors for tests and offline runs

pub mod api;
pub mod error;
pub mod mock;
pub mod provider;

pub use api::{ApiEmbedder, ApiEmbedderConfig, ApiFlavor};
pub use error::EmbeddingError;
pub use mock::MockEmbedder;
pub use provider::{EmbeddingProvider, ProviderInfo};
