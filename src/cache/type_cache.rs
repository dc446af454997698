//! Per-directory cache of child name types.
//!
//! Remembers whether a child base name was last seen as a file, a directory, a
//! symlink, or not at all. A fresh hint lets a lookup probe only one remote
//! candidate (or none) instead of both the plain object and the directory
//! marker. Hints expire after their own TTL, independent of the stat cache.
//!
//! The cache holds at most `capacity` hints. Hints leave in the order they
//! were recorded, which is also their expiry order, so expired hints are swept
//! from the front on every write and the oldest hint makes room when full.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::clock::{Clock, Expiry};

/// What a child name resolved to the last time it was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    NonExistent,
}

struct Hint {
    entry_type: EntryType,
    expiry: Expiry,
    seq: u64,
}

#[derive(Default)]
struct Hints {
    by_name: HashMap<String, Hint>,
    /// seq -> name, oldest first.
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl Hints {
    fn put(&mut self, name: &str, entry_type: EntryType, expiry: Expiry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let hint = Hint {
            entry_type,
            expiry,
            seq,
        };
        if let Some(old) = self.by_name.insert(name.to_string(), hint) {
            self.order.remove(&old.seq);
        }
        self.order.insert(seq, name.to_string());
    }

    fn remove(&mut self, name: &str) {
        if let Some(hint) = self.by_name.remove(name) {
            self.order.remove(&hint.seq);
        }
    }

    /// Drop expired hints, then the oldest ones while over `capacity`.
    fn sweep(&mut self, now: Instant, capacity: usize) {
        while let Some((_, oldest)) = self.order.first_key_value() {
            let expired = self
                .by_name
                .get(oldest)
                .map_or(true, |hint| hint.expiry.has_passed(now));
            if !expired && self.by_name.len() <= capacity {
                break;
            }
            if let Some((_, name)) = self.order.pop_first() {
                self.by_name.remove(&name);
            }
        }
    }
}

/// Name -> type hints for the children of one directory.
pub struct DirectoryTypeCache {
    ttl: Duration,
    capacity: usize,
    clock: Arc<dyn Clock>,
    hints: Mutex<Hints>,
}

impl DirectoryTypeCache {
    /// Create a cache holding at most `capacity` hints (minimum 1).
    pub fn new(ttl: Duration, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            clock,
            hints: Mutex::new(Hints::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert or overwrite the hint for `name`, valid until `now + ttl`.
    pub fn record_type(&self, name: &str, entry_type: EntryType) {
        let now = self.clock.now();
        let mut hints = self.lock();
        hints.put(name, entry_type, Expiry::after(now, self.ttl));
        hints.sweep(now, self.capacity);
    }

    /// The hint for `name`, or `None` if unknown or expired.
    pub fn get_type(&self, name: &str) -> Option<EntryType> {
        let now = self.clock.now();
        let mut hints = self.lock();
        let (entry_type, expiry) = hints
            .by_name
            .get(name)
            .map(|hint| (hint.entry_type, hint.expiry))?;
        if expiry.has_passed(now) {
            hints.remove(name);
            return None;
        }
        Some(entry_type)
    }

    /// Forget `name` immediately so the next lookup re-resolves it.
    pub fn invalidate(&self, name: &str) {
        self.lock().remove(name);
    }

    /// Number of unexpired hints.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        let mut hints = self.lock();
        hints.sweep(now, self.capacity);
        hints.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut hints = self.lock();
        hints.by_name.clear();
        hints.order.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Hints> {
        self.hints.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;

    const TTL: Duration = Duration::from_secs(30);

    fn make_cache() -> (DirectoryTypeCache, Arc<SimulatedClock>) {
        let clock = Arc::new(SimulatedClock::new());
        (DirectoryTypeCache::new(TTL, 100, clock.clone()), clock)
    }

    #[test]
    fn test_record_and_get() {
        let (cache, _) = make_cache();
        cache.record_type("foo", EntryType::Directory);
        cache.record_type("bar", EntryType::NonExistent);
        assert_eq!(cache.get_type("foo"), Some(EntryType::Directory));
        assert_eq!(cache.get_type("bar"), Some(EntryType::NonExistent));
        assert_eq!(cache.get_type("baz"), None);
    }

    #[test]
    fn test_overwrite_refreshes_kind() {
        let (cache, _) = make_cache();
        cache.record_type("foo", EntryType::Directory);
        cache.record_type("foo", EntryType::Symlink);
        assert_eq!(cache.get_type("foo"), Some(EntryType::Symlink));
    }

    #[test]
    fn test_expiry() {
        let (cache, clock) = make_cache();
        cache.record_type("foo", EntryType::File);

        clock.advance(TTL - Duration::from_millis(1));
        assert_eq!(cache.get_type("foo"), Some(EntryType::File));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get_type("foo"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate() {
        let (cache, _) = make_cache();
        cache.record_type("foo", EntryType::File);
        cache.invalidate("foo");
        assert_eq!(cache.get_type("foo"), None);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let clock = Arc::new(SimulatedClock::new());
        let cache = DirectoryTypeCache::new(Duration::ZERO, 100, clock);
        cache.record_type("foo", EntryType::File);
        assert_eq!(cache.get_type("foo"), None);
    }

    #[test]
    fn test_expired_hints_are_swept() {
        let (cache, clock) = make_cache();
        for i in 0..50 {
            cache.record_type(&format!("old{}", i), EntryType::File);
        }
        assert_eq!(cache.len(), 50);

        clock.advance(TTL);
        assert_eq!(cache.len(), 0);

        cache.record_type("new", EntryType::Directory);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_type("new"), Some(EntryType::Directory));
    }

    #[test]
    fn test_capacity_drops_oldest_recorded() {
        let clock = Arc::new(SimulatedClock::new());
        let cache = DirectoryTypeCache::new(TTL, 3, clock);
        for name in ["a", "b", "c"] {
            cache.record_type(name, EntryType::File);
        }
        // Re-recording "a" makes "b" the oldest.
        cache.record_type("a", EntryType::Symlink);
        cache.record_type("d", EntryType::Directory);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_type("b"), None);
        assert_eq!(cache.get_type("a"), Some(EntryType::Symlink));
        assert_eq!(cache.get_type("c"), Some(EntryType::File));
        assert_eq!(cache.get_type("d"), Some(EntryType::Directory));
    }

    #[test]
    fn test_unbounded_ttl_never_expires() {
        let clock = Arc::new(SimulatedClock::new());
        let cache = DirectoryTypeCache::new(Duration::MAX, 10, clock.clone());
        cache.record_type("foo", EntryType::Directory);

        clock.advance(Duration::from_secs(50 * 365 * 24 * 3600));
        assert_eq!(cache.get_type("foo"), Some(EntryType::Directory));
        assert_eq!(cache.len(), 1);
    }
}
