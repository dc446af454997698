//! Time sources injected into every cache.
//!
//! Production code uses [`RealClock`]. Tests use [`SimulatedClock`] so TTL
//! expiry can be driven deterministically with `advance()`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Source of the current instant for expiry bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Monotonic wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// Time is stored as a nanosecond offset from a fixed origin, so every reader
/// sees an `advance()` as a single atomic step.
#[derive(Debug)]
pub struct SimulatedClock {
    origin: Instant,
    offset_nanos: AtomicU64,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Move time forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.offset_nanos
            .fetch_add(duration_to_nanos(d), Ordering::SeqCst);
    }

    /// Jump to `offset` past the origin. Moving backwards is ignored.
    pub fn set_offset(&self, offset: Duration) {
        self.offset_nanos
            .fetch_max(duration_to_nanos(offset), Ordering::SeqCst);
    }

    /// Time elapsed since the clock was created.
    pub fn offset(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> Instant {
        self.origin + self.offset()
    }
}

/// When a cached entry stops being valid.
///
/// `Never` stands for a TTL too large to add to the current instant, so an
/// effectively infinite TTL keeps entries until they are evicted or erased.
/// Orders as `At(_) < Never`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Expiry {
    At(Instant),
    Never,
}

impl Expiry {
    pub fn after(now: Instant, ttl: Duration) -> Self {
        now.checked_add(ttl).map_or(Expiry::Never, Expiry::At)
    }

    /// Entries are valid strictly before their expiry instant.
    pub fn has_passed(&self, now: Instant) -> bool {
        match self {
            Expiry::At(at) => now >= *at,
            Expiry::Never => false,
        }
    }
}

fn duration_to_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_clock_stands_still() {
        let clock = SimulatedClock::new();
        let a = clock.now();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(clock.now(), a);
    }

    #[test]
    fn test_simulated_clock_advance() {
        let clock = SimulatedClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now() - start, Duration::from_secs(10));

        clock.advance(Duration::from_millis(1));
        assert_eq!(clock.offset(), Duration::from_millis(10_001));
    }

    #[test]
    fn test_simulated_clock_set_offset_never_goes_back() {
        let clock = SimulatedClock::new();
        clock.set_offset(Duration::from_secs(5));
        clock.set_offset(Duration::from_secs(2));
        assert_eq!(clock.offset(), Duration::from_secs(5));
    }

    #[test]
    fn test_expiry_after_huge_ttl_never_passes() {
        let clock = SimulatedClock::new();
        let expiry = Expiry::after(clock.now(), Duration::MAX);
        assert_eq!(expiry, Expiry::Never);

        clock.advance(Duration::from_secs(100 * 365 * 24 * 3600));
        assert!(!expiry.has_passed(clock.now()));
    }

    #[test]
    fn test_expiry_boundary_and_order() {
        let clock = SimulatedClock::new();
        let expiry = Expiry::after(clock.now(), Duration::from_secs(1));
        assert!(!expiry.has_passed(clock.now()));
        assert!(expiry < Expiry::Never);

        clock.advance(Duration::from_secs(1));
        assert!(expiry.has_passed(clock.now()));
    }

    #[test]
    fn test_real_clock_is_monotonic() {
        let clock = RealClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
