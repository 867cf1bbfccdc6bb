//! Fixed-capacity slow-SQL store (spec.md §3.5, component F, §6.4).

use apm_time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct SlowSqlEntry {
    pub id: u32,
    pub sql_obfuscated: String,
    pub metric: String,
    /// Free-form params blob (e.g. a JSON-encoded backtrace), carried
    /// verbatim to serialisation per spec.md §6.4.
    pub params_json: Option<String>,
    pub count: u64,
    pub min: Duration,
    pub max: Duration,
    pub total: Duration,
}

/// spec.md §6.4: `id` is a 32-bit hash of the obfuscated SQL text and the
/// scoped metric name.
pub fn fingerprint(sql_obfuscated: &str, metric: &str) -> u32 {
    let mut buf = Vec::with_capacity(sql_obfuscated.len() + metric.len() + 1);
    buf.extend_from_slice(sql_obfuscated.as_bytes());
    buf.push(0);
    buf.extend_from_slice(metric.as_bytes());
    rapidhash::rapidhash(&buf) as u32
}

/// A fixed-capacity table keyed by fingerprint (spec.md §3.5). A capacity
/// of zero means slow-SQL capture is disabled outright, not "use the
/// default" (spec.md §9, "Unresolved in source").
#[derive(Debug, Default)]
pub struct SlowSqlStore {
    capacity: usize,
    entries: Vec<SlowSqlEntry>,
}

impl SlowSqlStore {
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new(capacity: usize) -> Self {
        SlowSqlStore {
            capacity,
            entries: Vec::new(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.capacity == 0
    }

    /// Returns `true` if the candidate was recorded (either merged into an
    /// existing entry or newly inserted), `false` if dropped because the
    /// table is full or disabled.
    pub fn record(
        &mut self,
        sql_obfuscated: &str,
        metric: &str,
        duration: Duration,
        params_json: Option<String>,
    ) -> bool {
        if self.is_disabled() {
            return false;
        }
        let id = fingerprint(sql_obfuscated, metric);
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == id) {
            existing.count += 1;
            existing.total = existing.total + duration;
            existing.min = if duration < existing.min { duration } else { existing.min };
            existing.max = if duration > existing.max { duration } else { existing.max };
            return true;
        }
        if self.entries.len() >= self.capacity {
            tracing::warn!(target: "apm_txn", "slow-SQL table full, dropping new candidate");
            return false;
        }
        self.entries.push(SlowSqlEntry {
            id,
            sql_obfuscated: sql_obfuscated.to_string(),
            metric: metric.to_string(),
            params_json,
            count: 1,
            min: duration,
            max: duration,
            total: duration,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlowSqlEntry> {
        self.entries.iter()
    }
}
