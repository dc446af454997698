//! Bounded LRU cache of object metadata with per-entry TTL.
//!
//! Entries are keyed by full object name. A cached entry is either the
//! object's metadata or a negative marker recording that the object did not
//! exist. Expired entries are semantically absent and are dropped lazily on
//! lookup.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clock::{Clock, Expiry};
use crate::store::ObjectMetadata;

/// Result of a cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedStat {
    Found(ObjectMetadata),
    NotFound,
}

struct Entry {
    stat: CachedStat,
    expiry: Expiry,
    /// Position in the recency index.
    tick: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    /// tick -> name, oldest first.
    recency: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Inner {
    fn touch(&mut self, name: &str) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(entry) = self.entries.get_mut(name) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, name.to_string());
        }
    }

    fn put(&mut self, name: &str, stat: CachedStat, expiry: Expiry) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(old) = self.entries.insert(
            name.to_string(),
            Entry {
                stat,
                expiry,
                tick,
            },
        ) {
            self.recency.remove(&old.tick);
        }
        self.recency.insert(tick, name.to_string());
    }

    fn remove(&mut self, name: &str) -> bool {
        match self.entries.remove(name) {
            Some(entry) => {
                self.recency.remove(&entry.tick);
                true
            }
            None => false,
        }
    }

    fn evict_lru(&mut self) {
        if let Some((_, oldest)) = self.recency.pop_first() {
            self.entries.remove(&oldest);
            log::trace!("stat cache evicted {}", oldest);
        }
    }
}

/// LRU-evicted map from object name to cached metadata.
///
/// Internally synchronized; every operation takes the lock for a short,
/// non-blocking critical section.
pub struct StatCache {
    capacity: usize,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl StatCache {
    /// Create a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident entries, including expired ones not yet dropped.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cache `metadata` under its name until `now + ttl`.
    ///
    /// An unexpired existing entry wins if it describes a newer generation of
    /// the object, so a slow listing cannot overwrite a fresher local record.
    pub fn insert(&self, metadata: ObjectMetadata, ttl: Duration) {
        let now = self.clock.now();
        let expiry = Expiry::after(now, ttl);
        let mut inner = self.lock();

        if let Some(existing) = inner.entries.get(&metadata.name) {
            if !existing.expiry.has_passed(now) && !should_replace(&metadata, expiry, existing) {
                return;
            }
        }

        let name = metadata.name.clone();
        inner.put(&name, CachedStat::Found(metadata), expiry);
        while inner.entries.len() > self.capacity {
            inner.evict_lru();
        }
    }

    /// Record that `name` does not exist, until `now + ttl`.
    pub fn add_negative_entry(&self, name: &str, ttl: Duration) {
        let expiry = Expiry::after(self.clock.now(), ttl);
        let mut inner = self.lock();
        inner.put(name, CachedStat::NotFound, expiry);
        while inner.entries.len() > self.capacity {
            inner.evict_lru();
        }
    }

    /// Unexpired entry for `name`, if any. Marks it most recently used.
    pub fn lookup(&self, name: &str) -> Option<CachedStat> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expiry = inner.entries.get(name)?.expiry;
        if expiry.has_passed(now) {
            inner.remove(name);
            return None;
        }

        inner.touch(name);
        inner.entries.get(name).map(|e| e.stat.clone())
    }

    /// Drop any entry for `name` immediately.
    pub fn erase(&self, name: &str) {
        self.lock().remove(name);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    /// Panics if the name index and recency index disagree.
    pub fn check_invariants(&self) {
        let inner = self.lock();
        assert!(
            inner.entries.len() <= self.capacity,
            "stat cache over capacity: {} > {}",
            inner.entries.len(),
            self.capacity
        );
        assert_eq!(inner.entries.len(), inner.recency.len());
        for (tick, name) in &inner.recency {
            match inner.entries.get(name) {
                Some(entry) => assert_eq!(entry.tick, *tick, "stale tick for {}", name),
                None => panic!("recency index names missing entry {}", name),
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn should_replace(metadata: &ObjectMetadata, expiry: Expiry, existing: &Entry) -> bool {
    let current = match &existing.stat {
        CachedStat::NotFound => return true,
        CachedStat::Found(current) => current,
    };

    if metadata.generation != current.generation {
        return metadata.generation > current.generation;
    }
    if metadata.meta_generation != current.meta_generation {
        return metadata.meta_generation > current.meta_generation;
    }
    expiry > existing.expiry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use std::collections::BTreeMap;
    use std::time::SystemTime;

    const TTL: Duration = Duration::from_secs(60);

    fn object(name: &str, generation: i64, meta_generation: i64) -> ObjectMetadata {
        ObjectMetadata {
            name: name.to_string(),
            size: generation as u64,
            generation,
            meta_generation,
            updated: SystemTime::UNIX_EPOCH,
            metadata: BTreeMap::new(),
        }
    }

    fn make_cache(capacity: usize) -> (StatCache, Arc<SimulatedClock>) {
        let clock = Arc::new(SimulatedClock::new());
        (StatCache::new(capacity, clock.clone()), clock)
    }

    #[test]
    fn test_insert_and_lookup() {
        let (cache, _) = make_cache(10);
        cache.insert(object("foo", 1, 1), TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::Found(object("foo", 1, 1))));
        assert_eq!(cache.lookup("bar"), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let (cache, clock) = make_cache(10);
        cache.insert(object("foo", 1, 1), TTL);

        clock.advance(TTL - Duration::from_nanos(1));
        assert!(cache.lookup("foo").is_some(), "still fresh just before expiry");

        clock.advance(Duration::from_nanos(1));
        assert!(cache.lookup("foo").is_none(), "absent exactly at expiry");
        assert_eq!(cache.len(), 0, "expired entry dropped lazily");
    }

    #[test]
    fn test_negative_entry() {
        let (cache, clock) = make_cache(10);
        cache.add_negative_entry("foo", TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::NotFound));

        clock.advance(TTL);
        assert_eq!(cache.lookup("foo"), None);
    }

    #[test]
    fn test_erase_bypasses_ttl() {
        let (cache, _) = make_cache(10);
        cache.insert(object("foo", 1, 1), TTL);
        cache.erase("foo");
        assert_eq!(cache.lookup("foo"), None);
        cache.check_invariants();
    }

    #[test]
    fn test_lru_eviction_order() {
        let (cache, _) = make_cache(3);
        cache.insert(object("a", 1, 1), TTL);
        cache.insert(object("b", 1, 1), TTL);
        cache.insert(object("c", 1, 1), TTL);

        // Touch "a" so "b" becomes least recently used.
        assert!(cache.lookup("a").is_some());

        cache.insert(object("d", 1, 1), TTL);
        assert_eq!(cache.len(), 3);
        assert!(cache.lookup("b").is_none(), "b should be evicted (LRU)");
        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("c").is_some());
        assert!(cache.lookup("d").is_some());
        cache.check_invariants();
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let (cache, _) = make_cache(5);
        for i in 0..6 {
            cache.insert(object(&format!("obj{}", i), 1, 1), TTL);
            assert!(cache.len() <= 5);
        }
        // Exactly one entry (the first inserted) was evicted.
        assert!(cache.lookup("obj0").is_none());
        for i in 1..6 {
            assert!(cache.lookup(&format!("obj{}", i)).is_some());
        }
        cache.check_invariants();
    }

    #[test]
    fn test_positive_replaces_negative() {
        let (cache, _) = make_cache(10);
        cache.add_negative_entry("foo", TTL);
        cache.insert(object("foo", 1, 1), TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::Found(object("foo", 1, 1))));
    }

    #[test]
    fn test_older_generation_does_not_replace() {
        let (cache, _) = make_cache(10);
        cache.insert(object("foo", 5, 1), TTL);
        cache.insert(object("foo", 3, 9), TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::Found(object("foo", 5, 1))));

        cache.insert(object("foo", 5, 2), TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::Found(object("foo", 5, 2))));
    }

    #[test]
    fn test_same_generation_fresher_expiry_replaces() {
        let (cache, clock) = make_cache(10);
        cache.insert(object("foo", 1, 1), TTL);
        clock.advance(TTL / 2);
        cache.insert(object("foo", 1, 1), TTL);

        // Still present past the first insert's expiry.
        clock.advance(TTL / 2 + Duration::from_secs(1));
        assert!(cache.lookup("foo").is_some());
    }

    #[test]
    fn test_expired_entry_always_replaced() {
        let (cache, clock) = make_cache(10);
        cache.insert(object("foo", 5, 1), TTL);
        clock.advance(TTL);
        cache.insert(object("foo", 2, 1), TTL);
        assert_eq!(cache.lookup("foo"), Some(CachedStat::Found(object("foo", 2, 1))));
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let (cache, clock) = make_cache(10);
        cache.insert(object("foo", 1, 1), Duration::MAX);
        cache.add_negative_entry("bar", Duration::MAX);

        clock.advance(Duration::from_secs(50 * 365 * 24 * 3600));
        assert!(cache.lookup("foo").is_some());
        assert_eq!(cache.lookup("bar"), Some(CachedStat::NotFound));

        // A finite TTL does not displace a never-expiring record of the same
        // generation.
        cache.insert(object("foo", 1, 1), TTL);
        clock.advance(TTL);
        assert!(cache.lookup("foo").is_some());
    }

    #[test]
    fn test_concurrent_inserts_respect_capacity() {
        let (cache, _) = make_cache(64);
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let name = format!("t{}-{}", t, i);
                        cache.insert(object(&name, 1, 1), TTL);
                        let _ = cache.lookup(&name);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(cache.len(), 64);
        cache.check_invariants();
    }
}
