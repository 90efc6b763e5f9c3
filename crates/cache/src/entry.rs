//! Cache entry records and summaries

use crate::keys::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Captured output files: `/`-separated relative path to contents
pub type Artifacts = BTreeMap<String, Vec<u8>>;

/// Version of the on-disk record format
pub const RECORD_VERSION: u32 = 1;

/// Descriptive fields stored alongside an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub recipe: PathBuf,
    pub runtime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
    pub duration_ms: u64,
}

/// A cache hit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub artifacts: Artifacts,
    pub created_at: DateTime<Utc>,
    pub ttl: Duration,
    pub meta: EntryMeta,
}

impl CacheEntry {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        expiry(self.created_at, self.ttl)
    }
}

/// Blob reference inside an entry record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ArtifactRef {
    pub digest: String,
    pub size: u64,
}

/// JSON document stored under `entries/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct EntryRecord {
    pub version: u32,
    pub key: CacheKey,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
    #[serde(flatten)]
    pub meta: EntryMeta,
    pub artifacts: BTreeMap<String, ArtifactRef>,
}

impl EntryRecord {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        expiry(self.created_at, self.ttl())
    }

    /// Fresh while `now <= created_at + ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at()
    }

    pub fn total_bytes(&self) -> u64 {
        self.artifacts.values().map(|a| a.size).sum()
    }
}

fn expiry(created_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Freshness of a key in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Missing,
    Fresh { expires_at: DateTime<Utc> },
    Expired { expired_at: DateTime<Utc> },
}

/// One line of `list()`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub key: CacheKey,
    pub recipe: PathBuf,
    pub runtime: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub artifacts: usize,
    pub bytes: u64,
    pub expired: bool,
}

/// Aggregate store numbers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub expired_entries: usize,
    pub objects: usize,
    pub object_bytes: u64,
}

/// What `evict_expired` removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvictionReport {
    pub entries_removed: usize,
    pub objects_removed: usize,
    pub bytes_freed: u64,
}
