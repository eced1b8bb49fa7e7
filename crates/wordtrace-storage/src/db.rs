//! RocksDB wrapper for the keyword registry.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Atomic record + index writes
//! - Lookup by id and by canonical name
//! - Creation-ordered scans (cache warm-up, listings)
//! - Idempotent alias updates

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use tracing::{debug, info, instrument, warn};

use wordtrace_types::{CanonicalKeyword, Embedding, KeywordCategory, KeywordType};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_KEYWORDS, CF_KEYWORD_IDS, CF_KEYWORD_NAMES,
    CF_REGISTRY_META,
};
use crate::error::StorageError;
use crate::keys::{KeywordIdKey, KeywordKey, KeywordNameKey, META_DIMENSION_KEY};
use crate::registry::NewKeyword;

/// Main storage interface for the keyword registry
pub struct Storage {
    db: DB,
    /// Keyword sequence counter for creation ordering
    keyword_sequence: AtomicU64,
    /// Serializes check-then-insert and read-modify-write sequences
    write_lock: Mutex<()>,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening keyword registry at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(2);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        // Resume the sequence after the highest existing record
        let keyword_sequence = Self::load_keyword_sequence(&db)?;
        debug!(next_sequence = keyword_sequence, "Loaded keyword sequence");

        Ok(Self {
            db,
            keyword_sequence: AtomicU64::new(keyword_sequence),
            write_lock: Mutex::new(()),
        })
    }

    /// Load the next keyword sequence number from storage
    fn load_keyword_sequence(db: &DB) -> Result<u64, StorageError> {
        let cf = db
            .cf_handle(CF_KEYWORDS)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_KEYWORDS.to_string()))?;

        // Iterate in reverse to find highest key
        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            let keyword_key = KeywordKey::from_bytes(&key)?;
            return Ok(keyword_key.sequence + 1);
        }
        Ok(0)
    }

    fn next_keyword_sequence(&self) -> u64 {
        self.keyword_sequence.fetch_add(1, Ordering::SeqCst)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, a poisoned lock is still usable.
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Registry Metadata ====================

    /// Embedding dimension fixed by the first keyword, if any exist.
    pub fn embedding_dimension(&self) -> Result<Option<usize>, StorageError> {
        let cf = self.cf(CF_REGISTRY_META)?;
        match self.db.get_cf(cf, META_DIMENSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StorageError::Inconsistent("dimension entry has wrong length".to_string())
                })?;
                Ok(Some(u64::from_be_bytes(arr) as usize))
            }
            None => Ok(None),
        }
    }

    fn decode_keyword(
        &self,
        bytes: &[u8],
        dimension: Option<usize>,
    ) -> Result<CanonicalKeyword, StorageError> {
        let keyword = CanonicalKeyword::from_bytes(bytes)?;
        if let Some(expected) = dimension {
            keyword.embedding.ensure_dimension(expected)?;
        }
        Ok(keyword)
    }

    // ==================== Keyword Methods ====================

    /// Create a keyword with a fresh id.
    ///
    /// Writes the record, the id pointer and the name index in one batch.
    /// Fails with `DuplicateCanonicalName` if the name is taken and with
    /// `Dimension` if the embedding does not match the registry.
    #[instrument(skip(self, new), fields(canonical_name = %new.canonical_name))]
    pub fn create_keyword(&self, new: NewKeyword) -> Result<CanonicalKeyword, StorageError> {
        let keywords_cf = self.cf(CF_KEYWORDS)?;
        let ids_cf = self.cf(CF_KEYWORD_IDS)?;
        let names_cf = self.cf(CF_KEYWORD_NAMES)?;
        let meta_cf = self.cf(CF_REGISTRY_META)?;

        let _guard = self.lock_writes();

        let name_key = KeywordNameKey::new(&new.canonical_name);
        if let Some(existing) = self.db.get_cf(names_cf, name_key.to_bytes())? {
            let existing_id = String::from_utf8_lossy(&existing).to_string();
            warn!(existing_id = %existing_id, "Canonical name already registered");
            return Err(StorageError::DuplicateCanonicalName {
                name: new.canonical_name,
                existing_id,
            });
        }

        let dimension = self.embedding_dimension()?;
        if let Some(expected) = dimension {
            new.embedding.ensure_dimension(expected)?;
        }

        let id_key = KeywordIdKey::generate();
        let record_key = KeywordKey::new(self.next_keyword_sequence());
        let now = Utc::now();

        let mut aliases: Vec<String> = Vec::with_capacity(new.aliases.len());
        for alias in new.aliases {
            if alias != new.canonical_name && !aliases.contains(&alias) {
                aliases.push(alias);
            }
        }

        let keyword = CanonicalKeyword {
            id: id_key.id(),
            canonical_name: new.canonical_name,
            keyword_type: new.keyword_type,
            category: new.category,
            embedding: new.embedding,
            aliases,
            created_at: now,
            updated_at: now,
        };

        let mut batch = WriteBatch::default();
        batch.put_cf(keywords_cf, record_key.to_bytes(), keyword.to_bytes()?);
        batch.put_cf(ids_cf, id_key.to_bytes(), record_key.sequence_bytes());
        batch.put_cf(names_cf, name_key.to_bytes(), keyword.id.as_bytes());
        if dimension.is_none() {
            batch.put_cf(
                meta_cf,
                META_DIMENSION_KEY,
                (keyword.embedding.dimension() as u64).to_be_bytes(),
            );
        }

        self.db.write(batch)?;
        debug!(id = %keyword.id, sequence = record_key.sequence, "Created keyword");

        Ok(keyword)
    }

    fn record_key_for(&self, id: &str) -> Result<Option<KeywordKey>, StorageError> {
        let Some(id_key) = KeywordIdKey::parse(id) else {
            return Ok(None);
        };
        let ids_cf = self.cf(CF_KEYWORD_IDS)?;
        match self.db.get_cf(ids_cf, id_key.to_bytes())? {
            Some(bytes) => Ok(Some(KeywordKey::from_sequence_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_record(&self, key: KeywordKey, id: &str) -> Result<CanonicalKeyword, StorageError> {
        let keywords_cf = self.cf(CF_KEYWORDS)?;
        let bytes = self.db.get_cf(keywords_cf, key.to_bytes())?.ok_or_else(|| {
            StorageError::Inconsistent(format!(
                "id {} points at missing record {}",
                id, key.sequence
            ))
        })?;
        self.decode_keyword(&bytes, self.embedding_dimension()?)
    }

    /// Get a keyword by its id
    pub fn get_keyword(&self, id: &str) -> Result<Option<CanonicalKeyword>, StorageError> {
        match self.record_key_for(id)? {
            Some(key) => Ok(Some(self.get_record(key, id)?)),
            None => Ok(None),
        }
    }

    /// Get a keyword by its exact canonical name
    pub fn get_keyword_by_name(
        &self,
        canonical_name: &str,
    ) -> Result<Option<CanonicalKeyword>, StorageError> {
        let names_cf = self.cf(CF_KEYWORD_NAMES)?;
        let name_key = KeywordNameKey::new(canonical_name);
        let Some(id_bytes) = self.db.get_cf(names_cf, name_key.to_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id_bytes).to_string();
        let keyword = self.get_keyword(&id)?.ok_or_else(|| {
            StorageError::Inconsistent(format!(
                "name {:?} points at unknown id {}",
                canonical_name, id
            ))
        })?;
        Ok(Some(keyword))
    }

    /// Add an alias to a keyword.
    ///
    /// Returns false without writing when the alias is already present or
    /// equals the canonical name. Fails with `NotFound` for unknown ids.
    #[instrument(skip(self))]
    pub fn add_alias(&self, id: &str, alias: &str) -> Result<bool, StorageError> {
        let keywords_cf = self.cf(CF_KEYWORDS)?;

        let _guard = self.lock_writes();

        let key = self
            .record_key_for(id)?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let mut keyword = self.get_record(key, id)?;

        if keyword.is_redundant_alias(alias) {
            debug!("Alias already known");
            return Ok(false);
        }

        keyword.aliases.push(alias.to_string());
        keyword.updated_at = Utc::now();
        self.db
            .put_cf(keywords_cf, key.to_bytes(), keyword.to_bytes()?)?;

        debug!(alias_count = keyword.aliases.len(), "Added alias");
        Ok(true)
    }

    /// Visit every keyword record in creation order.
    fn scan_keywords<F>(&self, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(CanonicalKeyword),
    {
        let keywords_cf = self.cf(CF_KEYWORDS)?;
        let dimension = self.embedding_dimension()?;

        let iter = self.db.iterator_cf(
            keywords_cf,
            IteratorMode::From(KeywordKey::PREFIX, Direction::Forward),
        );

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(KeywordKey::PREFIX) {
                break;
            }
            visit(self.decode_keyword(&value, dimension)?);
        }

        Ok(())
    }

    /// All (id, embedding) pairs in creation order.
    pub fn list_keyword_embeddings(&self) -> Result<Vec<(String, Embedding)>, StorageError> {
        let mut pairs = Vec::new();
        self.scan_keywords(|kw| pairs.push((kw.id, kw.embedding)))?;
        debug!(count = pairs.len(), "Listed keyword embeddings");
        Ok(pairs)
    }

    /// All keywords in creation order.
    pub fn list_keywords(&self) -> Result<Vec<CanonicalKeyword>, StorageError> {
        let mut keywords = Vec::new();
        self.scan_keywords(|kw| keywords.push(kw))?;
        Ok(keywords)
    }

    /// Keywords of one type, optionally narrowed to a category.
    pub fn list_keywords_by_category(
        &self,
        keyword_type: KeywordType,
        category: Option<KeywordCategory>,
    ) -> Result<Vec<CanonicalKeyword>, StorageError> {
        let mut keywords = Vec::new();
        self.scan_keywords(|kw| {
            if kw.keyword_type == keyword_type && category.map_or(true, |c| kw.category == c) {
                keywords.push(kw);
            }
        })?;
        Ok(keywords)
    }

    /// Number of keywords in the registry.
    pub fn keyword_count(&self) -> Result<u64, StorageError> {
        self.count_cf_entries(self.cf(CF_KEYWORD_IDS)?)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get registry statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let mut stats = StorageStats {
            keyword_count: self.keyword_count()?,
            embedding_dimension: self.embedding_dimension()?,
            ..StorageStats::default()
        };

        self.scan_keywords(|kw| {
            stats.alias_count += kw.aliases.len() as u64;
            match kw.keyword_type {
                KeywordType::Entity => stats.entity_count += 1,
                KeywordType::Concept => stats.concept_count += 1,
            }
        })?;

        stats.disk_usage_bytes = self.get_disk_usage()?;
        Ok(stats)
    }

    fn count_cf_entries(&self, cf: &ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        for item in iter {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> Result<u64, StorageError> {
        let path = self.db.path();
        let mut total_size = 0u64;

        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }

        Ok(total_size)
    }
}

/// Statistics about the registry.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of canonical keywords
    pub keyword_count: u64,
    /// Keywords of type entity
    pub entity_count: u64,
    /// Keywords of type concept
    pub concept_count: u64,
    /// Total aliases across all keywords
    pub alias_count: u64,
    /// Registry embedding dimension (None while empty)
    pub embedding_dimension: Option<usize>,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}
