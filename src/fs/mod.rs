//! Filesystem view over the cached object store.
//!
//! [`Namespace`] is the composition root: it builds the stat cache and the
//! caching store from a [`CacheConfig`] and an injected clock, and hands out
//! one shared [`DirInode`] per directory so each directory keeps a single type
//! cache. The root lives as long as the namespace; any other directory, and
//! its type cache, is released once the last handle to it is dropped. Handle
//! tables, attribute serving and mount lifecycle belong to the
//! protocol binding on top of this module.

pub mod conflict;
pub mod dir;

pub use conflict::{Candidates, ConflictResolver, DirCandidate, Resolution};
pub use dir::DirInode;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use thiserror::Error;

use crate::cache::{CachingObjectStore, EntryType, StatCache};
use crate::clock::Clock;
use crate::config::{CacheConfig, ConfigError};
use crate::store::{ObjectMetadata, ObjectStore, StoreError};

// ── Entries ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    File,
    Directory,
    Symlink,
}

impl ChildKind {
    /// Kind of a plain (non-directory) object.
    pub fn of_object(metadata: &ObjectMetadata) -> Self {
        if metadata.is_symlink() {
            ChildKind::Symlink
        } else {
            ChildKind::File
        }
    }
}

impl From<ChildKind> for EntryType {
    fn from(kind: ChildKind) -> Self {
        match kind {
            ChildKind::File => EntryType::File,
            ChildKind::Directory => EntryType::Directory,
            ChildKind::Symlink => EntryType::Symlink,
        }
    }
}

/// A resolved child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// Name as seen inside the directory (suffixed for a conflict's secondary).
    pub name: String,
    pub kind: ChildKind,
    /// Backing object. `None` for implicit directories.
    pub metadata: Option<ObjectMetadata>,
}

impl ChildEntry {
    pub fn new(name: &str, kind: ChildKind, metadata: Option<ObjectMetadata>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            metadata,
        }
    }

    pub(crate) fn from_object(name: &str, metadata: ObjectMetadata) -> Self {
        Self::new(name, ChildKind::of_object(&metadata), Some(metadata))
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ChildKind::Directory
    }

    /// Size of the backing object, zero for directories without one.
    pub fn size(&self) -> u64 {
        self.metadata.as_ref().map(|m| m.size).unwrap_or(0)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FsError {
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("No such file or directory: {0}")]
    NotFound(String),
    #[error("Directory not empty: {0}")]
    NotEmpty(String),
    #[error("Is a directory: {0}")]
    IsADirectory(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ── Namespace ─────────────────────────────────────────────────────────────────

/// Directory handles sharing one caching store.
pub struct Namespace<S> {
    store: Arc<CachingObjectStore<S>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    resolver: ConflictResolver,
    root: Arc<DirInode<S>>,
    /// Non-root directories with live handles.
    dirs: Mutex<HashMap<String, Weak<DirInode<S>>>>,
}

impl<S: ObjectStore> Namespace<S> {
    pub fn new(store: S, config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let stat_cache = StatCache::new(config.stat_cache_capacity, clock.clone());
        let store = Arc::new(CachingObjectStore::new(
            store,
            stat_cache,
            config.stat_cache_ttl,
        ));
        let resolver = ConflictResolver::new(config.conflict_suffix.clone(), config.implicit_dirs);

        log::info!(
            "Namespace ready (stat ttl: {}s, capacity: {}, type ttl: {}s, capacity: {}, implicit dirs: {})",
            config.stat_cache_ttl.as_secs(),
            config.stat_cache_capacity,
            config.type_cache_ttl.as_secs(),
            config.type_cache_capacity,
            config.implicit_dirs
        );

        let root = Arc::new(new_dir(String::new(), &store, &resolver, &config, &clock));

        Ok(Self {
            store,
            config,
            clock,
            resolver,
            root,
            dirs: Mutex::new(HashMap::new()),
        })
    }

    /// The caching store, for object-level pass-through.
    pub fn store(&self) -> &Arc<CachingObjectStore<S>> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn root(&self) -> Arc<DirInode<S>> {
        self.root.clone()
    }

    /// Handle for the directory at `path` (`"a/b"`, slashes at either end
    /// ignored). Does not check that the directory exists.
    pub fn directory(&self, path: &str) -> Result<Arc<DirInode<S>>, FsError> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(self.root());
        }
        if trimmed.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return Err(FsError::InvalidName(path.to_string()));
        }
        Ok(self.dir_for_prefix(format!("{}/", trimmed)))
    }

    /// Number of non-root directories currently held open.
    pub fn open_directories(&self) -> usize {
        self.lock_dirs()
            .values()
            .filter(|dir| dir.strong_count() > 0)
            .count()
    }

    fn dir_for_prefix(&self, prefix: String) -> Arc<DirInode<S>> {
        let mut dirs = self.lock_dirs();
        if let Some(dir) = dirs.get(&prefix).and_then(Weak::upgrade) {
            return dir;
        }

        dirs.retain(|_, dir| dir.strong_count() > 0);
        let dir = Arc::new(new_dir(
            prefix.clone(),
            &self.store,
            &self.resolver,
            &self.config,
            &self.clock,
        ));
        dirs.insert(prefix, Arc::downgrade(&dir));
        dir
    }

    fn lock_dirs(&self) -> MutexGuard<'_, HashMap<String, Weak<DirInode<S>>>> {
        self.dirs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn new_dir<S: ObjectStore>(
    prefix: String,
    store: &Arc<CachingObjectStore<S>>,
    resolver: &ConflictResolver,
    config: &CacheConfig,
    clock: &Arc<dyn Clock>,
) -> DirInode<S> {
    DirInode::new(
        prefix,
        store.clone(),
        resolver.clone(),
        config.type_cache_ttl,
        config.type_cache_capacity,
        clock.clone(),
    )
}
