use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfscan_core::export::write_atomic;
use shelfscan_core::{fingerprint_file, ExtractionResult, ImageFingerprint, ScanError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::record::CacheRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to fingerprint {}: {source}", path.display())]
    Fingerprint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write cache store {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to serialize cache store: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<CacheError> for ScanError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Fingerprint { path, source } => ScanError::from_io(path, source),
            CacheError::Write { path, source } => ScanError::io(path, source),
            CacheError::Serialize(e) => ScanError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other(e),
            },
        }
    }
}

/// What `reload` found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded(usize),
    Missing,
    /// Unreadable or unparsable; the cache starts empty.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_images_processed: usize,
    pub successful_processing: usize,
    pub failed_processing: usize,
    pub total_barcodes_found: usize,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Persisted map from absolute path to the last extraction for that path.
///
/// Validity is decided by content: a record only counts while the file it
/// describes still hashes to the stored fingerprint. The cache is the only
/// writer of its store file. It does no locking of its own; callers that
/// share one across threads must serialize lookup-then-record per path.
#[derive(Debug, Default)]
pub struct ProcessingCache {
    store_path: Option<PathBuf>,
    records: BTreeMap<PathBuf, CacheRecord>,
}

impl ProcessingCache {
    /// Open the store at `store_path`. Never fails: a missing, unreadable
    /// or corrupt store yields an empty cache.
    pub fn open(store_path: impl Into<PathBuf>) -> Self {
        let mut cache = Self { store_path: Some(store_path.into()), records: BTreeMap::new() };
        cache.reload();
        cache
    }

    /// A cache with no backing file; `persist` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn store_path(&self) -> Option<&Path> {
        self.store_path.as_deref()
    }

    /// Replace in-memory state with what is on disk.
    pub fn reload(&mut self) -> LoadStatus {
        self.records.clear();
        let Some(store) = self.store_path.as_deref() else {
            return LoadStatus::Missing;
        };

        let body = match std::fs::read(store) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(store = %store.display(), "no cache store yet");
                return LoadStatus::Missing;
            }
            Err(e) => {
                let err = ScanError::CacheCorrupt(e.to_string());
                tracing::warn!(store = %store.display(), "{err}; starting with empty cache");
                return LoadStatus::Corrupt;
            }
        };

        match serde_json::from_slice::<BTreeMap<PathBuf, CacheRecord>>(&body) {
            Ok(records) => {
                self.records = records;
                tracing::debug!(store = %store.display(), entries = self.records.len(), "cache loaded");
                LoadStatus::Loaded(self.records.len())
            }
            Err(e) => {
                let err = ScanError::CacheCorrupt(e.to_string());
                tracing::warn!(store = %store.display(), "{err}; starting with empty cache");
                LoadStatus::Corrupt
            }
        }
    }

    /// Write the store atomically (temp file, then rename).
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(store) = self.store_path.as_deref() else {
            return Ok(());
        };
        let body = serde_json::to_vec_pretty(&self.records)?;
        write_atomic(store, &body).map_err(|source| CacheError::Write {
            path: store.to_path_buf(),
            source,
        })?;
        tracing::debug!(store = %store.display(), entries = self.records.len(), "cache persisted");
        Ok(())
    }

    /// Re-hash the file at `path` and return its record if the stored
    /// fingerprint still matches. A path never recorded is always a miss,
    /// even when another path holds identical bytes.
    pub fn lookup(&self, path: &Path) -> Result<Option<CacheRecord>, CacheError> {
        let fingerprint = fingerprint_file(path).map_err(|source| CacheError::Fingerprint {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.lookup_fingerprint(path, &fingerprint).cloned())
    }

    /// Lookup for a caller that already hashed the file.
    pub fn lookup_fingerprint(&self, path: &Path, fingerprint: &ImageFingerprint) -> Option<&CacheRecord> {
        let key = absolute_path(path);
        let record = self.records.get(&key)?;
        if record.fingerprint != *fingerprint {
            tracing::debug!(path = %key.display(), "fingerprint changed; record is stale");
            return None;
        }
        Some(record)
    }

    /// Store the outcome of a run, replacing any prior record for `path`.
    pub fn record(
        &mut self,
        path: &Path,
        fingerprint: ImageFingerprint,
        result: &ExtractionResult,
    ) -> &CacheRecord {
        self.insert(path, CacheRecord::from_result(fingerprint, result))
    }

    pub fn insert(&mut self, path: &Path, record: CacheRecord) -> &CacheRecord {
        let key = absolute_path(path);
        tracing::debug!(path = %key.display(), fingerprint = %record.fingerprint, "cache record");
        self.records.insert(key.clone(), record);
        &self.records[&key]
    }

    /// The stored record for `path`, without checking it against the file.
    pub fn get(&self, path: &Path) -> Option<&CacheRecord> {
        self.records.get(&absolute_path(path))
    }

    /// Drop one entry. Returns whether there was one.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.records.remove(&absolute_path(path)).is_some()
    }

    pub fn invalidate_all(&mut self) {
        self.records.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Path, &CacheRecord)> {
        self.records.iter().map(|(p, r)| (p.as_path(), r))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let successful = self.records.values().filter(|r| r.succeeded).count();
        CacheStats {
            total_images_processed: self.records.len(),
            successful_processing: successful,
            failed_processing: self.records.len() - successful,
            total_barcodes_found: self.records.values().map(|r| r.detected_barcodes.len()).sum(),
            last_processed_at: self.records.values().map(|r| r.recorded_at).max(),
        }
    }
}

/// Absolute form of `path` without resolving symlinks.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
