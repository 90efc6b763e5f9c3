//! Recipe output cache
//!
//! - [`keys`]: derives a [`CacheKey`] from a recipe, its inputs and environment
//! - [`store`]: the content-addressed on-disk [`CacheStore`] with ttl expiry
//! - [`mode`]: the global [`CacheMode`] read/write gate

pub mod entry;
pub mod hashing;
pub mod keys;
pub mod mode;
pub mod store;

pub use entry::{
    Artifacts, CacheEntry, EntryMeta, EntryStatus, EntrySummary, EvictionReport, StoreStats,
};
pub use hashing::{resolve_inputs, ContentHasher, ResolvedInput};
pub use keys::{CacheKey, KeyBuilder, KeyOutcome, KEY_SCHEMA_VERSION};
pub use mode::CacheMode;
pub use store::{CacheStore, DEFAULT_GC_GRACE};
