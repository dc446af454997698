//! bucketfs: metadata caching and consistency core for a filesystem view over
//! a flat object namespace.
//!
//! A bucket holds objects with flat names (`a/b/c.txt`). This crate answers the
//! questions a filesystem binding asks about such a bucket ("what is `c.txt`
//! inside `a/b`?", "what does `a/` contain?") while keeping remote round-trips
//! bounded:
//!
//! - [`cache::StatCache`] caches object metadata (and "not found") with a TTL.
//! - [`cache::CachingObjectStore`] wraps the remote store and keeps that cache
//!   coherent with local mutations.
//! - [`cache::DirectoryTypeCache`] remembers, per directory, whether a child
//!   name is a file, a directory, a symlink or absent.
//! - [`fs::ConflictResolver`] decides what to show when a directory and a file
//!   share one name.
//! - [`fs::DirInode`] ties it together behind `resolve_child` / `list_children`.

pub mod cache;
pub mod clock;
pub mod config;
pub mod fs;
pub mod store;

pub use cache::{CachingObjectStore, DirectoryTypeCache, EntryType, StatCache};
pub use clock::{Clock, Expiry, RealClock, SimulatedClock};
pub use config::CacheConfig;
pub use fs::{ChildEntry, ChildKind, ConflictResolver, DirInode, FsError, Namespace};
pub use store::{InMemoryStore, ObjectMetadata, ObjectStore, StoreError};
