//! Storage layer error types.

use thiserror::Error;
use wordtrace_types::DimensionMismatch;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// RocksDB operation failed
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Column family not found
    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),

    /// Key encoding/decoding error
    #[error("Key error: {0}")]
    Key(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Keyword not found
    #[error("Keyword not found: {0}")]
    NotFound(String),

    /// Another keyword already owns this canonical name
    #[error("Canonical name {name:?} already belongs to keyword {existing_id}")]
    DuplicateCanonicalName { name: String, existing_id: String },

    /// Embedding dimension differs from the registry's
    #[error(transparent)]
    Dimension(#[from] DimensionMismatch),

    /// Index entries disagree with stored records
    #[error("Registry inconsistency: {0}")]
    Inconsistent(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
