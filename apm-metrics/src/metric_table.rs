//! Bounded metric aggregation tables (spec.md §3.4, component E).
//!
//! Grounded on `submerge-coldb::dict`'s bounded, chunked aggregation style:
//! a fixed-capacity table that degrades by dropping new entries rather than
//! growing without limit, the same "resource exhaustion drops the new
//! datum, never corrupts existing data" rule as spec.md §7's
//! `ResourceExhausted` kind.

use std::collections::HashMap;

use apm_time::Duration;

/// count/total/exclusive/min/max/sumsquares for a plain timed metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricData {
    pub count: u64,
    pub total: Duration,
    pub exclusive: Duration,
    pub min: Duration,
    pub max: Duration,
    /// Sum of squared durations in seconds², used by the collector to
    /// derive standard deviation; kept as `f64` since microsecond-integer
    /// squares would overflow quickly.
    pub sum_of_squares: f64,
}

impl MetricData {
    fn single(duration: Duration, exclusive: Duration) -> Self {
        let secs = duration.as_secs_f64();
        MetricData {
            count: 1,
            total: duration,
            exclusive,
            min: duration,
            max: duration,
            sum_of_squares: secs * secs,
        }
    }

    fn merge(&mut self, duration: Duration, exclusive: Duration) {
        let secs = duration.as_secs_f64();
        self.count += 1;
        self.total = self.total + duration;
        self.exclusive = self.exclusive + exclusive;
        self.min = if duration < self.min { duration } else { self.min };
        self.max = if duration > self.max { duration } else { self.max };
        self.sum_of_squares += secs * secs;
    }
}

/// satisfying/tolerating/failing counts for an Apdex metric.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApdexData {
    pub satisfying: u64,
    pub tolerating: u64,
    pub failing: u64,
    pub min: Duration,
    pub max: Duration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApdexZone {
    Satisfying,
    Tolerating,
    Failing,
}

impl ApdexData {
    fn single(zone: ApdexZone, duration: Duration) -> Self {
        let mut d = ApdexData {
            satisfying: 0,
            tolerating: 0,
            failing: 0,
            min: duration,
            max: duration,
        };
        d.bump(zone);
        d
    }

    fn bump(&mut self, zone: ApdexZone) {
        match zone {
            ApdexZone::Satisfying => self.satisfying += 1,
            ApdexZone::Tolerating => self.tolerating += 1,
            ApdexZone::Failing => self.failing += 1,
        }
    }

    fn merge(&mut self, zone: ApdexZone, duration: Duration) {
        self.bump(zone);
        self.min = if duration < self.min { duration } else { self.min };
        self.max = if duration > self.max { duration } else { self.max };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Metric {
    Timed(MetricData),
    Apdex(ApdexData),
}

/// A bounded map from metric name to aggregate (spec.md §3.4). New metric
/// *names* are refused once `limit` distinct names exist, unless the
/// addition is `forced`, in which case it is allowed until `hard_cap`
/// (spec.md: "bypasses the limit until an absolute ceiling"; the exact
/// ceiling is unspecified upstream, so this implementation fixes it at
/// `5 * limit`, recorded as an Open Question decision in DESIGN.md).
/// Updates to an *existing* name are always accepted regardless of either
/// limit, since they don't grow the table.
#[derive(Debug)]
pub struct MetricTable {
    limit: usize,
    hard_cap: usize,
    metrics: HashMap<String, Metric>,
}

impl MetricTable {
    pub const DEFAULT_LIMIT: usize = 2000;

    pub fn new(limit: usize) -> Self {
        MetricTable {
            limit,
            hard_cap: limit.saturating_mul(5),
            metrics: HashMap::new(),
        }
    }

    fn can_insert_new(&self, forced: bool) -> bool {
        let cap = if forced { self.hard_cap } else { self.limit };
        self.metrics.len() < cap
    }

    /// Record a duration/exclusive-time sample against `name`. Returns
    /// `false` if the metric was dropped (`ResourceExhausted`, spec.md §7).
    pub fn add_timed(&mut self, name: &str, duration: Duration, exclusive: Duration, forced: bool) -> bool {
        if let Some(Metric::Timed(data)) = self.metrics.get_mut(name) {
            data.merge(duration, exclusive);
            return true;
        }
        if !self.can_insert_new(forced) {
            tracing::warn!(target: "apm_txn", metric = name, "metric table full, dropping new metric");
            return false;
        }
        self.metrics
            .insert(name.to_string(), Metric::Timed(MetricData::single(duration, exclusive)));
        true
    }

    /// Record an apdex sample (spec.md §4.7). `duration` feeds `min`/`max`.
    pub fn add_apdex(&mut self, name: &str, zone: ApdexZone, duration: Duration, forced: bool) -> bool {
        if let Some(Metric::Apdex(data)) = self.metrics.get_mut(name) {
            data.merge(zone, duration);
            return true;
        }
        if !self.can_insert_new(forced) {
            tracing::warn!(target: "apm_txn", metric = name, "metric table full, dropping new apdex metric");
            return false;
        }
        self.metrics
            .insert(name.to_string(), Metric::Apdex(ApdexData::single(zone, duration)));
        true
    }

    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Metric)> {
        self.metrics.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merging_accumulates_count_and_total() {
        let mut t = MetricTable::new(10);
        t.add_timed("Custom/a", Duration::from_millis(100), Duration::from_millis(80), false);
        t.add_timed("Custom/a", Duration::from_millis(50), Duration::from_millis(50), false);
        match t.get("Custom/a").unwrap() {
            Metric::Timed(d) => {
                assert_eq!(d.count, 2);
                assert_eq!(d.total, Duration::from_millis(150));
                assert_eq!(d.min, Duration::from_millis(50));
                assert_eq!(d.max, Duration::from_millis(100));
            }
            _ => panic!("expected timed metric"),
        }
    }

    #[test]
    fn new_names_dropped_once_at_limit() {
        let mut t = MetricTable::new(1);
        assert!(t.add_timed("a", Duration::ZERO, Duration::ZERO, false));
        assert!(!t.add_timed("b", Duration::ZERO, Duration::ZERO, false));
        assert_eq!(t.len(), 1);
        // Updating the existing entry still works past the limit.
        assert!(t.add_timed("a", Duration::from_millis(1), Duration::ZERO, false));
    }

    #[test]
    fn forced_bypasses_limit_until_hard_cap() {
        let mut t = MetricTable::new(1);
        t.add_timed("a", Duration::ZERO, Duration::ZERO, false);
        assert!(t.add_timed("b", Duration::ZERO, Duration::ZERO, true));
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn apdex_zone_counts_are_mutually_exclusive() {
        let mut t = MetricTable::new(10);
        t.add_apdex("Apdex", ApdexZone::Satisfying, Duration::from_millis(1), true);
        t.add_apdex("Apdex", ApdexZone::Failing, Duration::from_millis(9), true);
        match t.get("Apdex").unwrap() {
            Metric::Apdex(d) => {
                assert_eq!(d.satisfying, 1);
                assert_eq!(d.tolerating, 0);
                assert_eq!(d.failing, 1);
            }
            _ => panic!("expected apdex metric"),
        }
    }
}
