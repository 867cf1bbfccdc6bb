//! Public facade over the transaction instrumentation engine: a host
//! application only needs this crate plus whichever host-side contracts
//! (`apm_txn::DatastoreHost`, a URL/rule source, a RNG-backed harvest
//! sampler) it actually implements.

pub use apm_base::{AttributeValue, TxnTypeFlags};
pub use apm_metrics::{ApdexZone, CustomEvent, CustomEventRing, Metric, MetricTable, SlowSqlEntry, SlowSqlStore};
pub use apm_rules::{NamingInput, NamingOutcome, Rule, RuleOutcome, RuleSet, SegmentTermRule, SegmentTermsTable};
pub use apm_time::{Clock, Duration, Stamp, Timestamp};
pub use apm_trace::{build_trace_payload, sample_span_events, span_events_to_json, SpanEvent, MAX_TRACE_SEGMENTS};
pub use apm_txn::{
    join_security_policies, AttributeDestination, AttributeStore, BeginInput, CatResponse, ConnectReply, CpuTime,
    CrossProcessState, DatastoreHost, DatastoreInput, DatastoreVendor, DtInboundPayload, DtState, ErrorSlot,
    FinalizedTxn, Intrinsics, NameResult, PathType, PolicyBool, PolicyBoolDefault, RecordSqlMode, RecordedError,
    SecurityPolicies, Status, Txn, TxnOptions,
};
