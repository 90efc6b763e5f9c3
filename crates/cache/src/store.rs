//! Content-addressed on-disk cache store
//!
//! Layout under the cache root:
//!
//! ```text
//! entries/<k[0..2]>/<key>.json   entry record with artifact digests
//! objects/<d[0..2]>/<digest>     artifact contents
//! ```
//!
//! Every file is published with an atomic rename. `put` writes blobs before
//! the record that references them, so a reader that finds a record always
//! finds its blobs unless they were removed out from under the store.

use crate::entry::{
    ArtifactRef, Artifacts, CacheEntry, EntryMeta, EntryRecord, EntryStatus, EntrySummary,
    EvictionReport, StoreStats, RECORD_VERSION,
};
use crate::keys::CacheKey;
use chrono::{DateTime, Utc};
use plasma_core::{Clock, Error, Result};
use plasma_utils::{is_temp_artifact, sha256_hex, write_atomic};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const ENTRIES_DIR: &str = "entries";
const OBJECTS_DIR: &str = "objects";

/// Unreferenced blobs younger than this survive eviction
pub const DEFAULT_GC_GRACE: Duration = Duration::from_secs(60 * 60);

/// Persistent map from cache key to artifacts
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    gc_grace: Duration,
}

impl CacheStore {
    /// Open (creating if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Result<Self> {
        let root = root.into();
        for dir in [ENTRIES_DIR, OBJECTS_DIR] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .map_err(|e| Error::cache_store("open", &path, e.to_string()))?;
        }
        debug!(root = %root.display(), "Opened cache store");
        Ok(Self {
            root,
            clock,
            gc_grace: DEFAULT_GC_GRACE,
        })
    }

    /// Override the blob garbage collection grace period
    #[must_use]
    pub fn with_gc_grace(mut self, grace: Duration) -> Self {
        self.gc_grace = grace;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(ENTRIES_DIR)
            .join(key.shard())
            .join(format!("{key}.json"))
    }

    fn object_path(&self, digest: &str) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(&digest[..2]).join(digest)
    }

    fn read_record(&self, key: &CacheKey) -> Result<Option<EntryRecord>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::cache_store("read", &path, e.to_string())),
        };
        let record: EntryRecord = serde_json::from_slice(&bytes)
            .map_err(|e| Error::cache_store("read", &path, format!("corrupt record: {e}")))?;
        if record.key != *key {
            return Err(Error::cache_store(
                "read",
                &path,
                format!("record belongs to key {}", record.key),
            ));
        }
        Ok(Some(record))
    }

    fn remove_file(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::cache_store("remove", path, e.to_string())),
        }
    }

    /// Remove an expired record unless a newer one replaced it since it was read
    fn remove_stale_record(path: &Path, created_at: DateTime<Utc>) -> Result<bool> {
        let current = fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<EntryRecord>(&bytes).ok());
        if current.is_some_and(|record| record.created_at != created_at) {
            debug!(path = %path.display(), "Record was replaced, keeping it");
            return Ok(false);
        }
        Self::remove_file(path)
    }

    /// Stamp an existing blob as used now; `false` when it does not exist
    fn refresh_blob(&self, object: &Path) -> Result<bool> {
        let file = match fs::File::options().write(true).open(object) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(Error::cache_store("write", object, e.to_string())),
        };
        file.set_modified(self.clock.now().into())
            .map_err(|e| Error::cache_store("write", object, e.to_string()))?;
        Ok(true)
    }

    /// Return the entry for `key` if it exists and has not expired.
    ///
    /// An expired record is deleted and reported as a miss. A missing blob or
    /// a corrupt record is an error.
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let Some(record) = self.read_record(key)? else {
            debug!(key = %key.short(), "Cache miss");
            return Ok(None);
        };

        let now = self.clock.now();
        if !record.is_fresh(now) {
            debug!(key = %key.short(), expired_at = %record.expires_at(), "Cache entry expired");
            Self::remove_stale_record(&self.entry_path(key), record.created_at)?;
            return Ok(None);
        }

        let mut artifacts = Artifacts::new();
        for (path, artifact) in &record.artifacts {
            let object = self.object_path(&artifact.digest);
            let bytes = fs::read(&object).map_err(|e| {
                Error::cache_store("read", &object, format!("missing blob for '{path}': {e}"))
            })?;
            if sha256_hex(&bytes) != artifact.digest {
                return Err(Error::cache_store(
                    "read",
                    &object,
                    format!("blob for '{path}' does not match its digest"),
                ));
            }
            artifacts.insert(path.clone(), bytes);
        }

        debug!(key = %key.short(), artifacts = artifacts.len(), "Cache hit");
        Ok(Some(CacheEntry {
            key: key.clone(),
            artifacts,
            created_at: record.created_at,
            ttl: record.ttl(),
            meta: record.meta,
        }))
    }

    /// Publish artifacts under `key`, replacing any previous entry
    pub fn put(
        &self,
        key: &CacheKey,
        artifacts: &Artifacts,
        ttl: Duration,
        meta: EntryMeta,
    ) -> Result<CacheEntry> {
        let mut refs = BTreeMap::new();
        for (path, bytes) in artifacts {
            let digest = sha256_hex(bytes);
            let object = self.object_path(&digest);
            // Reused blobs are restamped so eviction treats them as recent
            if !self.refresh_blob(&object)? {
                write_atomic(&object, bytes)
                    .map_err(|e| Error::cache_store("write", &object, e.to_string()))?;
                self.refresh_blob(&object)?;
            }
            refs.insert(
                path.clone(),
                ArtifactRef {
                    digest,
                    size: bytes.len() as u64,
                },
            );
        }

        let created_at = self.clock.now();
        let record = EntryRecord {
            version: RECORD_VERSION,
            key: key.clone(),
            created_at,
            ttl_secs: ttl.as_secs(),
            meta: meta.clone(),
            artifacts: refs,
        };
        let path = self.entry_path(key);
        let json = serde_json::to_vec_pretty(&record)?;
        write_atomic(&path, &json).map_err(|e| Error::cache_store("write", &path, e.to_string()))?;

        info!(
            key = %key.short(),
            artifacts = artifacts.len(),
            ttl_secs = ttl.as_secs(),
            "Stored cache entry"
        );

        Ok(CacheEntry {
            key: key.clone(),
            artifacts: artifacts.clone(),
            created_at,
            ttl: Duration::from_secs(ttl.as_secs()),
            meta,
        })
    }

    /// Freshness of `key` without modifying the store
    pub fn status(&self, key: &CacheKey) -> Result<EntryStatus> {
        Ok(match self.read_record(key)? {
            None => EntryStatus::Missing,
            Some(record) if record.is_fresh(self.clock.now()) => EntryStatus::Fresh {
                expires_at: record.expires_at(),
            },
            Some(record) => EntryStatus::Expired {
                expired_at: record.expires_at(),
            },
        })
    }

    /// Delete the entry for `key`; blobs are left for eviction
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        Self::remove_file(&self.entry_path(key))
    }

    fn records(&self) -> Vec<(PathBuf, Option<EntryRecord>)> {
        let dir = self.root.join(ENTRIES_DIR);
        WalkDir::new(&dir)
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.ends_with(".json") && !is_temp_artifact(name))
            })
            .map(|entry| {
                let record = fs::read(entry.path())
                    .ok()
                    .and_then(|bytes| serde_json::from_slice::<EntryRecord>(&bytes).ok());
                (entry.into_path(), record)
            })
            .collect()
    }

    /// Summaries of every readable record, newest first
    pub fn list(&self) -> Result<Vec<EntrySummary>> {
        let now = self.clock.now();
        let mut summaries: Vec<EntrySummary> = self
            .records()
            .into_iter()
            .filter_map(|(_, record)| record)
            .map(|record| EntrySummary {
                expired: !record.is_fresh(now),
                expires_at: record.expires_at(),
                artifacts: record.artifacts.len(),
                bytes: record.total_bytes(),
                key: record.key,
                recipe: record.meta.recipe,
                runtime: record.meta.runtime,
                created_at: record.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.key.cmp(&b.key)));
        Ok(summaries)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let now = self.clock.now();
        let mut stats = StoreStats::default();
        for (_, record) in self.records() {
            stats.entries += 1;
            if record.map_or(true, |r| !r.is_fresh(now)) {
                stats.expired_entries += 1;
            }
        }
        for (_, size) in self.objects() {
            stats.objects += 1;
            stats.object_bytes += size;
        }
        Ok(stats)
    }

    fn objects(&self) -> Vec<(PathBuf, u64)> {
        WalkDir::new(self.root.join(OBJECTS_DIR))
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                (entry.into_path(), size)
            })
            .collect()
    }

    fn older_than_grace(&self, path: &Path, now: DateTime<Utc>) -> bool {
        let Ok(modified) = path.metadata().and_then(|m| m.modified()) else {
            return false;
        };
        let modified: DateTime<Utc> = modified.into();
        chrono::Duration::from_std(self.gc_grace)
            .map(|grace| now - modified > grace)
            .unwrap_or(false)
    }

    /// Remove expired and unreadable records, then blobs no record references
    /// once they are older than the grace period.
    pub fn evict_expired(&self) -> Result<EvictionReport> {
        let now = self.clock.now();
        let mut report = EvictionReport::default();
        let mut referenced = HashSet::new();

        for (path, record) in self.records() {
            match record {
                Some(record) if record.is_fresh(now) => {
                    referenced.extend(record.artifacts.into_values().map(|a| a.digest));
                }
                Some(record) => {
                    if Self::remove_stale_record(&path, record.created_at)? {
                        report.entries_removed += 1;
                    }
                }
                None => {
                    warn!(path = %path.display(), "Removing unreadable cache record");
                    if Self::remove_file(&path)? {
                        report.entries_removed += 1;
                    }
                }
            }
        }

        for (path, size) in self.objects() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let unreferenced = is_temp_artifact(name) || !referenced.contains(name);
            if unreferenced && self.older_than_grace(&path, now) && Self::remove_file(&path)? {
                report.objects_removed += 1;
                report.bytes_freed += size;
            }
        }

        if report != EvictionReport::default() {
            info!(
                entries = report.entries_removed,
                objects = report.objects_removed,
                bytes = report.bytes_freed,
                "Evicted expired cache data"
            );
        }
        Ok(report)
    }

    /// Remove every entry and blob; returns the number of entries dropped
    pub fn clear(&self) -> Result<usize> {
        let removed = self.records().len();
        for dir in [ENTRIES_DIR, OBJECTS_DIR] {
            let path = self.root.join(dir);
            match fs::remove_dir_all(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(Error::cache_store("clear", &path, e.to_string())),
            }
            fs::create_dir_all(&path)
                .map_err(|e| Error::cache_store("clear", &path, e.to_string()))?;
        }
        info!(entries = removed, "Cleared cache store");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plasma_core::ManualClock;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn key(seed: char) -> CacheKey {
        CacheKey::from_hex(seed.to_string().repeat(64)).unwrap()
    }

    fn setup() -> (TempDir, Arc<ManualClock>, CacheStore) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = CacheStore::open(dir.path().join("cache"), clock.clone()).unwrap();
        (dir, clock, store)
    }

    fn artifacts() -> Artifacts {
        let mut artifacts = Artifacts::new();
        artifacts.insert("out/result.txt".to_string(), b"result\n".to_vec());
        artifacts.insert("out/data.bin".to_string(), vec![0, 1, 2, 255]);
        artifacts
    }

    #[test]
    fn test_put_then_lookup_is_byte_exact() {
        let (_dir, _clock, store) = setup();
        let k = key('a');
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();

        let entry = store.lookup(&k).unwrap().unwrap();
        assert_eq!(entry.artifacts, artifacts());
        assert_eq!(entry.ttl, HOUR);
    }

    #[test]
    fn test_ttl_boundary() {
        let (_dir, clock, store) = setup();
        let k = key('b');
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();

        clock.advance(chrono::Duration::minutes(59));
        assert!(store.lookup(&k).unwrap().is_some());

        clock.advance(chrono::Duration::minutes(1));
        assert!(store.lookup(&k).unwrap().is_some(), "now == expiry is fresh");

        clock.advance(chrono::Duration::minutes(1));
        assert!(store.lookup(&k).unwrap().is_none());
        assert_eq!(store.status(&k).unwrap(), EntryStatus::Missing);
    }

    #[test]
    fn test_newer_put_overwrites() {
        let (_dir, _clock, store) = setup();
        let k = key('c');
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();
        let mut newer = Artifacts::new();
        newer.insert("out/result.txt".to_string(), b"v2".to_vec());
        store.put(&k, &newer, HOUR, EntryMeta::default()).unwrap();
        assert_eq!(store.lookup(&k).unwrap().unwrap().artifacts, newer);
    }

    #[test]
    fn test_missing_blob_is_store_error() {
        let (_dir, _clock, store) = setup();
        let k = key('d');
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();
        fs::remove_dir_all(store.root().join(OBJECTS_DIR)).unwrap();
        assert!(matches!(store.lookup(&k), Err(Error::CacheStore { .. })));
    }

    #[test]
    fn test_corrupt_record_is_store_error() {
        let (_dir, _clock, store) = setup();
        let k = key('e');
        let path = store.entry_path(&k);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(store.lookup(&k), Err(Error::CacheStore { .. })));
    }

    #[test]
    fn test_status_list_stats_remove() {
        let (_dir, clock, store) = setup();
        store.put(&key('1'), &artifacts(), HOUR, EntryMeta::default()).unwrap();
        clock.advance(chrono::Duration::seconds(1));
        store
            .put(&key('2'), &artifacts(), Duration::from_secs(10), EntryMeta::default())
            .unwrap();
        clock.advance(chrono::Duration::seconds(30));

        assert!(matches!(store.status(&key('1')).unwrap(), EntryStatus::Fresh { .. }));
        assert!(matches!(store.status(&key('2')).unwrap(), EntryStatus::Expired { .. }));

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].key, key('2'));
        assert!(listed[0].expired);

        let stats = store.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.objects, 2, "identical artifacts share blobs");

        assert!(store.remove(&key('1')).unwrap());
        assert!(!store.remove(&key('1')).unwrap());
    }

    #[test]
    fn test_evict_expired_collects_blobs_after_grace() {
        let (_dir, clock, store) = setup();
        let store = store.with_gc_grace(Duration::ZERO);
        store.put(&key('f'), &artifacts(), HOUR, EntryMeta::default()).unwrap();

        let report = store.evict_expired().unwrap();
        assert_eq!(report.entries_removed, 0);
        assert_eq!(report.objects_removed, 0);

        clock.advance(chrono::Duration::hours(2));
        let report = store.evict_expired().unwrap();
        assert_eq!(report.entries_removed, 1);
        assert_eq!(report.objects_removed, 2);
        assert_eq!(store.stats().unwrap(), StoreStats::default());
    }

    #[test]
    fn test_reused_blob_survives_eviction_of_its_old_entry() {
        let (_dir, clock, store) = setup();
        store
            .put(&key('8'), &artifacts(), Duration::from_secs(10), EntryMeta::default())
            .unwrap();
        clock.advance(chrono::Duration::hours(2));

        // Same content under a new key; its record is dropped to mimic an
        // eviction pass that listed records before this put landed
        store.put(&key('9'), &artifacts(), HOUR, EntryMeta::default()).unwrap();
        assert!(store.remove(&key('9')).unwrap());

        let report = store.evict_expired().unwrap();
        assert_eq!(report.entries_removed, 1);
        assert_eq!(report.objects_removed, 0);
        assert_eq!(store.stats().unwrap().objects, 2);
    }

    #[test]
    fn test_blob_removed_before_put_is_rewritten() {
        let (_dir, _clock, store) = setup();
        let k = key('a');
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();
        fs::remove_dir_all(store.root().join(OBJECTS_DIR)).unwrap();
        assert!(store.lookup(&k).is_err());

        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();
        assert_eq!(store.lookup(&k).unwrap().unwrap().artifacts, artifacts());
    }

    #[test]
    fn test_stale_removal_keeps_replaced_record() {
        let (_dir, clock, store) = setup();
        let k = key('b');
        store
            .put(&k, &artifacts(), Duration::from_secs(10), EntryMeta::default())
            .unwrap();
        let stale = store.read_record(&k).unwrap().unwrap();
        clock.advance(chrono::Duration::minutes(1));
        store.put(&k, &artifacts(), HOUR, EntryMeta::default()).unwrap();

        let path = store.entry_path(&k);
        assert!(!CacheStore::remove_stale_record(&path, stale.created_at).unwrap());
        assert!(store.lookup(&k).unwrap().is_some());

        let current = store.read_record(&k).unwrap().unwrap();
        assert!(CacheStore::remove_stale_record(&path, current.created_at).unwrap());
        assert_eq!(store.status(&k).unwrap(), EntryStatus::Missing);
    }

    #[test]
    fn test_clear() {
        let (_dir, _clock, store) = setup();
        store.put(&key('7'), &artifacts(), HOUR, EntryMeta::default()).unwrap();
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.lookup(&key('7')).unwrap().is_none());
    }
}
