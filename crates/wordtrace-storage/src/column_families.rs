//! Column family definitions for RocksDB.
//!
//! Each column family isolates data with different access patterns:
//! - keywords: Append-only keyword records keyed by creation sequence
//! - keyword_ids: id -> sequence pointers
//! - keyword_names: canonical name -> id (uniqueness index)
//! - registry_meta: registry-wide values such as the embedding dimension

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for keyword records
pub const CF_KEYWORDS: &str = "keywords";

/// Column family name for the id index
pub const CF_KEYWORD_IDS: &str = "keyword_ids";

/// Column family name for the canonical name index
pub const CF_KEYWORD_NAMES: &str = "keyword_names";

/// Column family name for registry metadata
pub const CF_REGISTRY_META: &str = "registry_meta";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[
    CF_KEYWORDS,
    CF_KEYWORD_IDS,
    CF_KEYWORD_NAMES,
    CF_REGISTRY_META,
];

/// Create column family options for keyword records (embeddings dominate, compress)
fn keywords_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_KEYWORDS, keywords_options()),
        ColumnFamilyDescriptor::new(CF_KEYWORD_IDS, Options::default()),
        ColumnFamilyDescriptor::new(CF_KEYWORD_NAMES, Options::default()),
        ColumnFamilyDescriptor::new(CF_REGISTRY_META, Options::default()),
    ]
}
