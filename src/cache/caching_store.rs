//! Object store wrapper that serves stats from a [`StatCache`].
//!
//! - stat: fresh cache hit => no remote call; miss => call through and cache
//!   the result, including "not found".
//! - create/overwrite/delete: remote first, then the name is erased and (on a
//!   successful write) re-inserted, so the writer sees its own write at once.
//! - list: always remote; returned objects are cached opportunistically.

use std::time::Duration;

use super::stat_cache::{CachedStat, StatCache};
use crate::store::{
    CreateRequest, ListRequest, ListResponse, ObjectMetadata, ObjectStore, StoreError,
};

pub struct CachingObjectStore<S> {
    wrapped: S,
    cache: StatCache,
    ttl: Duration,
}

impl<S: ObjectStore> CachingObjectStore<S> {
    pub fn new(wrapped: S, cache: StatCache, ttl: Duration) -> Self {
        Self {
            wrapped,
            cache,
            ttl,
        }
    }

    pub fn stat_cache(&self) -> &StatCache {
        &self.cache
    }

    /// The uncached store underneath.
    pub fn wrapped(&self) -> &S {
        &self.wrapped
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace the contents of `name`, creating it if needed.
    pub async fn overwrite_object(
        &self,
        name: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Result<ObjectMetadata, StoreError> {
        self.create_object(CreateRequest::new(name, contents)).await
    }
}

impl<S: ObjectStore> ObjectStore for CachingObjectStore<S> {
    async fn stat_object(&self, name: &str) -> Result<ObjectMetadata, StoreError> {
        match self.cache.lookup(name) {
            Some(CachedStat::Found(metadata)) => {
                log::trace!("stat cache hit: {}", name);
                return Ok(metadata);
            }
            Some(CachedStat::NotFound) => {
                log::trace!("stat cache negative hit: {}", name);
                return Err(StoreError::NotFound(name.to_string()));
            }
            None => {}
        }

        log::debug!("stat cache miss, calling through: {}", name);
        match self.wrapped.stat_object(name).await {
            Ok(metadata) => {
                self.cache.insert(metadata.clone(), self.ttl);
                Ok(metadata)
            }
            Err(StoreError::NotFound(missing)) => {
                self.cache.add_negative_entry(name, self.ttl);
                Err(StoreError::NotFound(missing))
            }
            Err(e) => Err(e),
        }
    }

    async fn list_objects(&self, req: &ListRequest) -> Result<ListResponse, StoreError> {
        let listing = self.wrapped.list_objects(req).await?;
        log::debug!(
            "listed {} objects and {} prefixes under {:?}, caching object metadata",
            listing.objects.len(),
            listing.prefixes.len(),
            req.prefix
        );
        for object in &listing.objects {
            self.cache.insert(object.clone(), self.ttl);
        }
        Ok(listing)
    }

    async fn create_object(&self, req: CreateRequest) -> Result<ObjectMetadata, StoreError> {
        let name = req.name.clone();
        let result = self.wrapped.create_object(req).await;

        // Erased even on failure: the remote state is unknown.
        self.cache.erase(&name);
        let metadata = result?;
        self.cache.insert(metadata.clone(), self.ttl);
        Ok(metadata)
    }

    async fn delete_object(&self, name: &str) -> Result<(), StoreError> {
        let result = self.wrapped.delete_object(name).await;
        self.cache.erase(name);
        result
    }
}
