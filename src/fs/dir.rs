//! Directory inode: child resolution, listing and mutations.
//!
//! A directory is identified by its object-name prefix (`""` for the root,
//! `"a/b/"` below it). A child base name `foo` has two remote candidates:
//!
//! - the plain object `prefix + "foo"` (file, or symlink via user metadata)
//! - the directory marker `prefix + "foo/"`, or with implicit directories
//!   enabled, any object under `prefix + "foo/"`
//!
//! Listings are delimited on `/`: one level of objects and markers, with each
//! deeper subtree collapsed into a single prefix.
//!
//! The per-directory type cache lets most lookups probe one candidate or none.
//! It is written only by full two-sided resolutions and by local mutations, so
//! out-of-band changes become visible once its TTL elapses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::conflict::{Candidates, ConflictResolver, DirCandidate, Resolution};
use super::{ChildEntry, ChildKind, FsError};
use crate::cache::{CachingObjectStore, DirectoryTypeCache, EntryType};
use crate::clock::Clock;
use crate::store::{
    CreateRequest, ListRequest, ObjectMetadata, ObjectStore, StoreError, SYMLINK_TARGET_KEY,
};

pub struct DirInode<S> {
    prefix: String,
    store: Arc<CachingObjectStore<S>>,
    resolver: ConflictResolver,
    type_cache: DirectoryTypeCache,
}

impl<S: ObjectStore> DirInode<S> {
    pub(crate) fn new(
        prefix: String,
        store: Arc<CachingObjectStore<S>>,
        resolver: ConflictResolver,
        type_cache_ttl: Duration,
        type_cache_capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefix,
            store,
            resolver,
            type_cache: DirectoryTypeCache::new(type_cache_ttl, type_cache_capacity, clock),
        }
    }

    /// Object-name prefix of this directory's children.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn type_cache(&self) -> &DirectoryTypeCache {
        &self.type_cache
    }

    // ── Lookup ────────────────────────────────────────────────────────────────

    /// Resolve a child by name.
    ///
    /// A name carrying the conflict suffix resolves to the file side of a
    /// file/directory conflict, and only while both sides are present.
    pub async fn resolve_child(&self, name: &str) -> Result<Option<ChildEntry>, FsError> {
        if let Some(base) = self.resolver.strip_suffix(name) {
            return self.resolve_conflicting(base).await;
        }
        check_component(name)?;

        let hint = self.type_cache.get_type(name);
        let candidates = match hint {
            Some(EntryType::NonExistent) => {
                log::trace!("type cache says {:?} does not exist in {:?}", name, self.prefix);
                return Ok(None);
            }
            Some(EntryType::Directory) => Candidates {
                directory: self.probe_dir(name).await?,
                file: None,
            },
            Some(EntryType::File) | Some(EntryType::Symlink) => Candidates {
                directory: None,
                file: self.probe_file(name).await?,
            },
            None => {
                let (directory, file) = tokio::join!(self.probe_dir(name), self.probe_file(name));
                Candidates {
                    directory: directory?,
                    file: file?,
                }
            }
        };

        let resolution = self.resolver.resolve(name, candidates);
        // Only a full two-sided probe refreshes the hint.
        if hint.is_none() {
            self.note_resolution(name, &resolution);
        }
        Ok(resolution.primary().cloned())
    }

    /// Two explicit lookups: the directory must exist before the file side is
    /// considered.
    async fn resolve_conflicting(&self, base: &str) -> Result<Option<ChildEntry>, FsError> {
        check_component(base)?;

        let Some(directory) = self.probe_dir(base).await? else {
            return Ok(None);
        };
        let file = self.probe_file(base).await?;

        let resolution = self.resolver.resolve(
            base,
            Candidates {
                directory: Some(directory),
                file,
            },
        );
        Ok(resolution.into_secondary())
    }

    /// List all children. Conflicting names appear twice: the directory under
    /// the plain name, the file under the suffixed name.
    pub async fn list_children(&self) -> Result<Vec<ChildEntry>, FsError> {
        let listing = self
            .store
            .list_objects(&ListRequest::children_of(self.prefix.clone()))
            .await?;

        let mut groups: BTreeMap<String, Candidates> = BTreeMap::new();
        for object in listing.objects {
            let Some((base, slot)) = self.classify(&object.name) else {
                continue;
            };
            let candidates = groups.entry(base).or_default();
            match slot {
                Slot::Object => candidates.file = Some(object),
                Slot::Marker => candidates.directory = Some(DirCandidate::Explicit(object)),
            }
        }
        for prefix in &listing.prefixes {
            let Some(base) = self.collapsed_base(prefix) else {
                continue;
            };
            groups
                .entry(base.to_string())
                .or_default()
                .directory
                .get_or_insert(DirCandidate::Implicit);
        }

        let mut entries = Vec::with_capacity(groups.len());
        for (base, candidates) in groups {
            let resolution = self.resolver.resolve(&base, candidates);
            self.note_resolution(&base, &resolution);
            match resolution {
                Resolution::NotFound => {}
                Resolution::Single(entry) => entries.push(entry),
                Resolution::Conflict { primary, secondary } => {
                    entries.push(primary);
                    entries.push(secondary);
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Create a new empty-or-filled file. Fails if the name is taken.
    pub async fn create_file(
        &self,
        name: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Result<ChildEntry, FsError> {
        self.check_new_name(name)?;
        self.ensure_absent(name).await?;

        let req = CreateRequest::new(self.object_name(name), contents).if_absent();
        let metadata = self.create(name, req).await?;
        self.type_cache.record_type(name, EntryType::File);
        Ok(ChildEntry::from_object(name, metadata))
    }

    /// Write `contents` to a file, creating it or replacing what is there.
    pub async fn write_file(
        &self,
        name: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Result<ChildEntry, FsError> {
        self.check_new_name(name)?;
        if let Some(existing) = self.resolve_child(name).await? {
            if existing.is_dir() {
                return Err(FsError::IsADirectory(name.to_string()));
            }
        }

        let metadata = self
            .store
            .overwrite_object(&self.object_name(name), contents)
            .await?;
        self.type_cache.record_type(name, EntryType::File);
        Ok(ChildEntry::from_object(name, metadata))
    }

    pub async fn create_directory(&self, name: &str) -> Result<ChildEntry, FsError> {
        self.check_new_name(name)?;
        self.ensure_absent(name).await?;

        let req = CreateRequest::new(self.marker_name(name), Vec::new()).if_absent();
        let metadata = self.create(name, req).await?;
        self.type_cache.record_type(name, EntryType::Directory);
        Ok(ChildEntry::new(name, ChildKind::Directory, Some(metadata)))
    }

    pub async fn create_symlink(&self, name: &str, target: &str) -> Result<ChildEntry, FsError> {
        self.check_new_name(name)?;
        self.ensure_absent(name).await?;

        let req = CreateRequest::new(self.object_name(name), Vec::new())
            .with_metadata(SYMLINK_TARGET_KEY, target)
            .if_absent();
        let metadata = self.create(name, req).await?;
        self.type_cache.record_type(name, EntryType::Symlink);
        Ok(ChildEntry::from_object(name, metadata))
    }

    /// Remove a file or symlink. A suffixed conflict name removes the file
    /// side of the conflict.
    pub async fn unlink(&self, name: &str) -> Result<(), FsError> {
        let entry = self
            .resolve_child(name)
            .await?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory(name.to_string()));
        }
        let Some(metadata) = entry.metadata else {
            return Err(FsError::NotFound(name.to_string()));
        };

        self.store.delete_object(&metadata.name).await?;
        let base = self.resolver.strip_suffix(name).unwrap_or(name);
        self.type_cache.invalidate(base);
        log::debug!("unlinked {:?}", metadata.name);
        Ok(())
    }

    /// Remove an empty directory.
    pub async fn remove_directory(&self, name: &str) -> Result<(), FsError> {
        let entry = self
            .resolve_child(name)
            .await?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if !entry.is_dir() {
            return Err(FsError::NotADirectory(name.to_string()));
        }

        let marker = self.marker_name(name);
        let listing = self
            .store
            .list_objects(&ListRequest::new(marker.clone()).with_max_results(2))
            .await?;
        if listing.objects.iter().any(|o| o.name != marker) {
            return Err(FsError::NotEmpty(name.to_string()));
        }

        if entry.metadata.is_some() {
            self.store.delete_object(&marker).await?;
        }
        self.type_cache.invalidate(name);
        log::debug!("removed directory {:?}", marker);
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn object_name(&self, base: &str) -> String {
        format!("{}{}", self.prefix, base)
    }

    fn marker_name(&self, base: &str) -> String {
        format!("{}{}/", self.prefix, base)
    }

    async fn probe_file(&self, base: &str) -> Result<Option<ObjectMetadata>, FsError> {
        match self.store.stat_object(&self.object_name(base)).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn probe_dir(&self, base: &str) -> Result<Option<DirCandidate>, FsError> {
        let marker = self.marker_name(base);
        match self.store.stat_object(&marker).await {
            Ok(metadata) => return Ok(Some(DirCandidate::Explicit(metadata))),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        if !self.resolver.implicit_dirs() {
            return Ok(None);
        }
        let descendants = self
            .store
            .list_objects(&ListRequest::new(marker).with_max_results(1))
            .await?;
        Ok((!descendants.is_empty()).then_some(DirCandidate::Implicit))
    }

    fn note_resolution(&self, base: &str, resolution: &Resolution) {
        let entry_type = match resolution {
            Resolution::NotFound => EntryType::NonExistent,
            Resolution::Single(entry) => entry.kind.into(),
            Resolution::Conflict { secondary, .. } => {
                log::warn!(
                    "Name conflict in {:?}: {:?} is both a directory and a {:?}; file exposed as {:?}",
                    self.prefix,
                    base,
                    secondary.kind,
                    secondary.name
                );
                EntryType::Directory
            }
        };
        self.type_cache.record_type(base, entry_type);
    }

    /// Split a listed object name into the child base name it belongs to.
    /// Deeper names never appear in a delimited listing and are skipped.
    fn classify(&self, object_name: &str) -> Option<(String, Slot)> {
        let rest = object_name.strip_prefix(self.prefix.as_str())?;
        match rest.split_once('/') {
            None if rest.is_empty() => None,
            None => Some((rest.to_string(), Slot::Object)),
            Some(("", _)) => None,
            Some((base, "")) => Some((base.to_string(), Slot::Marker)),
            Some(_) => None,
        }
    }

    /// Child base name of a collapsed prefix `self.prefix + base + "/"`.
    fn collapsed_base<'a>(&self, prefix: &'a str) -> Option<&'a str> {
        prefix
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix('/')
            .filter(|base| !base.is_empty() && !base.contains('/'))
    }

    fn check_new_name(&self, name: &str) -> Result<(), FsError> {
        check_component(name)?;
        if name.ends_with(self.resolver.suffix()) {
            return Err(FsError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    async fn ensure_absent(&self, name: &str) -> Result<(), FsError> {
        match self.resolve_child(name).await? {
            Some(_) => Err(FsError::AlreadyExists(name.to_string())),
            None => Ok(()),
        }
    }

    async fn create(&self, name: &str, req: CreateRequest) -> Result<ObjectMetadata, FsError> {
        self.store.create_object(req).await.map_err(|e| match e {
            StoreError::PreconditionFailed { .. } => FsError::AlreadyExists(name.to_string()),
            other => FsError::Store(other),
        })
    }
}

/// Where a listed object sits relative to a child base name.
enum Slot {
    /// `prefix + base`
    Object,
    /// `prefix + base + "/"`
    Marker,
}

fn check_component(name: &str) -> Result<(), FsError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(FsError::InvalidName(name.to_string()));
    }
    Ok(())
}
