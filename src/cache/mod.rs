//! Cache Module
//!
//! Versioned response storage: generations keyed by name, entries keyed by
//! normalized request URL, with lifetime-based expiry. Generations live in
//! memory or persist on disk.

mod disk;
mod entry;
mod key;
mod stats;
mod storage;
mod store;


// Re-export public types
pub use disk::DiskCacheStorage;
pub use entry::CachedResponse;
pub use key::normalize_url;
pub use stats::CacheStats;
pub use storage::{Cache, CacheStorage, MemoryCacheStorage};
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 2048;
