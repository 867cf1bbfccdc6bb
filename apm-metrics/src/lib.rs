mod event_ring;
mod metric_table;
mod slow_sql;
mod supportability;

pub use event_ring::{CustomEvent, CustomEventRing};
pub use metric_table::{ApdexData, ApdexZone, Metric, MetricData, MetricTable};
pub use slow_sql::{fingerprint as slow_sql_fingerprint, SlowSqlEntry, SlowSqlStore};
pub use supportability::SupportabilityCounter;
