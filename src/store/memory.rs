//! In-memory object store.
//!
//! Behaves like a single bucket: flat names, monotonically increasing
//! generations, generation preconditions. Clones share the same bucket, so a
//! test can hand one clone to the cache layer and mutate another "out of band".

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use super::types::{CreateRequest, ListRequest, ListResponse, ObjectMetadata};
use super::{ObjectStore, StoreError};

/// Number of calls that reached the store, per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CallCounts {
    pub stat: u64,
    pub list: u64,
    pub create: u64,
    pub delete: u64,
}

impl CallCounts {
    pub fn total(&self) -> u64 {
        self.stat + self.list + self.create + self.delete
    }
}

#[derive(Default)]
struct Bucket {
    objects: BTreeMap<String, StoredObject>,
    next_generation: i64,
    failure: Option<StoreError>,
}

struct StoredObject {
    metadata: ObjectMetadata,
    contents: Vec<u8>,
}

#[derive(Default)]
struct Counters {
    stat: AtomicU64,
    list: AtomicU64,
    create: AtomicU64,
    delete: AtomicU64,
}

/// Shared in-memory bucket.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    bucket: Arc<Mutex<Bucket>>,
    counters: Arc<Counters>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far.
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            stat: self.counters.stat.load(Ordering::SeqCst),
            list: self.counters.list.load(Ordering::SeqCst),
            create: self.counters.create.load(Ordering::SeqCst),
            delete: self.counters.delete.load(Ordering::SeqCst),
        }
    }

    /// Make every subsequent call fail with `err` until `clear_failure()`.
    pub fn fail_with(&self, err: StoreError) {
        self.lock().failure = Some(err);
    }

    pub fn clear_failure(&self) {
        self.lock().failure = None;
    }

    /// Current contents of an object, bypassing call accounting.
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock()
            .objects
            .get(name)
            .map(|o| o.contents.clone())
    }

    /// Number of objects in the bucket.
    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failure(bucket: &Bucket) -> Result<(), StoreError> {
        match &bucket.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl ObjectStore for InMemoryStore {
    async fn stat_object(&self, name: &str) -> Result<ObjectMetadata, StoreError> {
        self.counters.stat.fetch_add(1, Ordering::SeqCst);
        let bucket = self.lock();
        Self::check_failure(&bucket)?;
        bucket
            .objects
            .get(name)
            .map(|o| o.metadata.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn list_objects(&self, req: &ListRequest) -> Result<ListResponse, StoreError> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        let bucket = self.lock();
        Self::check_failure(&bucket)?;

        let limit = req.max_results.unwrap_or(usize::MAX);
        let delimiter = req.delimiter.as_deref().filter(|d| !d.is_empty());
        let mut response = ListResponse::default();
        let mut results = 0;

        let matching = bucket
            .objects
            .range(req.prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&req.prefix));
        for (name, object) in matching {
            if results >= limit {
                break;
            }
            let rest = &name[req.prefix.len()..];
            let Some(end) = delimiter.and_then(|d| rest.find(d).map(|at| at + d.len())) else {
                response.objects.push(object.metadata.clone());
                results += 1;
                continue;
            };

            if end == rest.len() && req.include_trailing_delimiter {
                response.objects.push(object.metadata.clone());
                results += 1;
            }
            // Names sharing a collapsed prefix are adjacent in name order.
            let collapsed = &name[..req.prefix.len() + end];
            if response.prefixes.last().map(String::as_str) != Some(collapsed) {
                response.prefixes.push(collapsed.to_string());
                results += 1;
            }
        }
        Ok(response)
    }

    async fn create_object(&self, req: CreateRequest) -> Result<ObjectMetadata, StoreError> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        let mut bucket = self.lock();
        Self::check_failure(&bucket)?;

        if let Some(expected) = req.generation_precondition {
            let current = bucket
                .objects
                .get(&req.name)
                .map(|o| o.metadata.generation)
                .unwrap_or(0);
            if current != expected {
                return Err(StoreError::PreconditionFailed { name: req.name });
            }
        }

        bucket.next_generation += 1;
        let metadata = ObjectMetadata {
            name: req.name.clone(),
            size: req.contents.len() as u64,
            generation: bucket.next_generation,
            meta_generation: 1,
            updated: SystemTime::now(),
            metadata: req.metadata,
        };
        bucket.objects.insert(
            req.name,
            StoredObject {
                metadata: metadata.clone(),
                contents: req.contents,
            },
        );
        Ok(metadata)
    }

    async fn delete_object(&self, name: &str) -> Result<(), StoreError> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        let mut bucket = self.lock();
        Self::check_failure(&bucket)?;
        bucket
            .objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
