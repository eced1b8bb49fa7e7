//! Key encoding and decoding for the keyword registry.
//!
//! Record key format: `kw:{sequence:020}`
//! - sequence: monotonic creation counter, zero-padded to 20 digits so that
//!   lexicographic order equals creation order
//!
//! Index key formats: `id:{ulid}` and `name:{canonical_name}`.

use ulid::Ulid;

use crate::error::StorageError;

/// Key for keyword records
/// Format: kw:{sequence:020}
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeywordKey {
    /// Creation sequence number
    pub sequence: u64,
}

impl KeywordKey {
    /// Prefix shared by all record keys
    pub const PREFIX: &'static [u8] = b"kw:";

    pub fn new(sequence: u64) -> Self {
        Self { sequence }
    }

    /// Encode key to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        format!("kw:{:020}", self.sequence).into_bytes()
    }

    /// Decode key from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;

        let sequence = s
            .strip_prefix("kw:")
            .ok_or_else(|| StorageError::Key(format!("Invalid keyword key format: {}", s)))?
            .parse::<u64>()
            .map_err(|e| StorageError::Key(format!("Invalid sequence: {}", e)))?;

        Ok(Self { sequence })
    }

    /// Encode the sequence as the value stored in the id index
    pub fn sequence_bytes(&self) -> [u8; 8] {
        self.sequence.to_be_bytes()
    }

    /// Decode a sequence pointer read from the id index
    pub fn from_sequence_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        let arr: [u8; 8] = bytes
            .try_into()
            .map_err(|_| StorageError::Key(format!("Invalid sequence pointer length: {}", bytes.len())))?;
        Ok(Self::new(u64::from_be_bytes(arr)))
    }
}

/// Key for the id index
/// Format: id:{ulid}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordIdKey {
    pub ulid: Ulid,
}

impl KeywordIdKey {
    /// Create a key for a freshly generated id
    pub fn generate() -> Self {
        Self { ulid: Ulid::new() }
    }

    /// Parse an id string. Returns None for strings that are not ULIDs,
    /// which can never name a stored keyword.
    pub fn parse(id: &str) -> Option<Self> {
        id.parse().ok().map(|ulid| Self { ulid })
    }

    /// The id string handed out to callers
    pub fn id(&self) -> String {
        self.ulid.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("id:{}", self.ulid).into_bytes()
    }
}

/// Key for the canonical name index
/// Format: name:{canonical_name}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordNameKey {
    pub canonical_name: String,
}

impl KeywordNameKey {
    pub fn new(canonical_name: impl Into<String>) -> Self {
        Self {
            canonical_name: canonical_name.into(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!("name:{}", self.canonical_name).into_bytes()
    }
}

/// Metadata key holding the registry's embedding dimension
pub const META_DIMENSION_KEY: &[u8] = b"meta:dimension";
