//! Monotonic timestamps and durations for the transaction engine.
//!
//! Grounded on `submerge-net`'s `NodeTime`/`RealmTime`/`Duration` trio: a
//! wall-clock microsecond count paired with a node-local event counter so
//! that two timestamps can be strictly ordered even when they land on the
//! same microsecond. Here there is only one "node" (the owning transaction),
//! so the counter collapses to a single per-transaction `Stamp`.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// A span of time in signed 64-bit microseconds.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Duration(i64);

impl Duration {
    pub const ZERO: Duration = Duration(0);

    pub fn from_micros(micros: i64) -> Self {
        Duration(micros)
    }

    pub fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000)
    }

    pub fn from_secs_f64(secs: f64) -> Self {
        Duration((secs * 1_000_000.0).round() as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn as_millis_f64(&self) -> f64 {
        self.0 as f64 / 1_000.0
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    pub fn max(self, other: Duration) -> Duration {
        Duration(self.0.max(other.0))
    }

    /// Clamp negative durations to zero, per spec.md §4.7's
    /// `max(0, duration - root_kids_duration)` and queue-time rules.
    pub fn non_negative(self) -> Duration {
        Duration(self.0.max(0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Add for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Duration {
    fn sum<I: Iterator<Item = Duration>>(iter: I) -> Duration {
        iter.fold(Duration::ZERO, Add::add)
    }
}

/// A transaction-local, strictly increasing ordering token. Two timestamps
/// with equal `when` are still totally ordered by `stamp`; this is what
/// lets external-call rollup (spec.md §4.6.2 step 5) detect "no intervening
/// saved node" by checking `prev.stop.stamp + 1 == new.start.stamp`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Stamp(u64);

impl Stamp {
    pub fn initial() -> Self {
        Stamp(0)
    }

    pub fn next(self) -> Self {
        Stamp(self.0 + 1)
    }

    pub fn is_immediately_after(&self, earlier: Stamp) -> bool {
        self.0 == earlier.0 + 1
    }
}

/// A monotonic timestamp: wall-clock microseconds since an arbitrary epoch,
/// plus the ordering stamp at which it was taken.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    when: i64,
    stamp: Stamp,
}

impl Timestamp {
    pub fn new(when: i64, stamp: Stamp) -> Self {
        Timestamp { when, stamp }
    }

    pub fn when(&self) -> i64 {
        self.when
    }

    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    pub fn delta(&self, earlier: Timestamp) -> Duration {
        Duration(self.when - earlier.when)
    }

    /// Offset of `self` relative to `base`, clamped to `>= 0` as required
    /// when emitting trace-node start/stop offsets (spec.md §6.2).
    pub fn offset_ms(&self, base: Timestamp) -> f64 {
        self.delta(base).non_negative().as_millis_f64()
    }
}

/// Hands out strictly increasing [`Timestamp`]s for one transaction. Not
/// `Sync`: per spec.md §5 a transaction is mutated from a single execution
/// context at a time, so the clock needs no internal locking.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    next_stamp: Stamp,
}

impl Clock {
    pub fn new() -> Self {
        Clock {
            next_stamp: Stamp::initial(),
        }
    }

    /// Take a timestamp for `when` (caller-supplied wall-clock micros,
    /// usually from a host-provided monotonic source), stamping it with
    /// the next ordering token.
    pub fn tick(&mut self, when: i64) -> Timestamp {
        let stamp = self.next_stamp;
        self.next_stamp = self.next_stamp.next();
        Timestamp { when, stamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_strictly_increase() {
        let mut clock = Clock::new();
        let a = clock.tick(100);
        let b = clock.tick(100);
        assert_eq!(a.when(), b.when());
        assert!(b.stamp() > a.stamp());
        assert!(b.stamp().is_immediately_after(a.stamp()));
    }

    #[test]
    fn duration_non_negative_clamps() {
        let d = Duration::from_micros(-5);
        assert_eq!(d.non_negative(), Duration::ZERO);
    }

    #[test]
    fn offset_ms_clamps_to_base() {
        let mut clock = Clock::new();
        let base = clock.tick(1_000_000);
        let before = clock.tick(500_000);
        assert_eq!(before.offset_ms(base), 0.0);
        let after = clock.tick(1_004_000);
        assert_eq!(after.offset_ms(base), 4.0);
    }
}
