//! Metadata caches.
//!
//! - StatCache: object name -> metadata (or "not found"), LRU + TTL
//! - CachingObjectStore: `ObjectStore` wrapper keeping the StatCache coherent
//! - DirectoryTypeCache: per-directory child name -> type hint, TTL

pub mod caching_store;
pub mod stat_cache;
pub mod type_cache;

pub use caching_store::CachingObjectStore;
pub use stat_cache::{CachedStat, StatCache};
pub use type_cache::{DirectoryTypeCache, EntryType};
