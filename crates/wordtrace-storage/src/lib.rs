//! Storage layer for the WordTrace canonical keyword registry.
//!
//! Provides RocksDB-backed storage with:
//! - Column family isolation for records, id index, name index and metadata
//! - Sequence-ordered record keys so scans return keywords in creation order
//! - Atomic record + index writes via WriteBatch
//! - Canonical-name uniqueness enforced at write time
//! - A fixed embedding dimension per registry, checked on every read and write

pub mod column_families;
pub mod db;
pub mod error;
pub mod keys;
pub mod registry;

pub use db::{Storage, StorageStats};
pub use error::StorageError;
pub use keys::{KeywordIdKey, KeywordKey, KeywordNameKey};
pub use registry::{KeywordRegistry, NewKeyword};
