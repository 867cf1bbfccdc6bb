//! The transaction lifecycle (spec.md §3.1, §4.1-§4.2, §4.7-§4.8): owns the
//! segment arena, string pool, metric tables, and all the per-transaction
//! state the component modules in this crate operate over, and threads
//! `begin`/segment/`end` calls through to them.

use std::collections::HashMap;

use apm_base::{AttributeValue, TxnTypeFlags};
use apm_metrics::{CustomEventRing, MetricTable, SlowSqlStore};
use apm_rules::{RuleSet, SegmentTermsTable};
use apm_segment::{SegmentArena, SegmentId};
use apm_strings::StringPool;
use apm_time::{Clock, Duration, Timestamp};
use apm_trace::{build_trace_payload, sample_span_events, SpanEvent};

use crate::attributes::{AttributeDestination, AttributeStore};
use crate::datastore::{terminate_datastore, DatastoreHost, DatastoreInput, DatastoreVendor};
use crate::dt::{ConnectReply, DtInboundPayload, DtState};
use crate::error_record::{ErrorSlot, RecordedError};
use crate::external::{terminate_external, CatResponse};
use crate::finalize::{finalize, CpuTime, Intrinsics};
use crate::guid::new_guid;
use crate::naming::{name_transaction, NameResult};
use crate::options::TxnOptions;
use crate::status::{PathType, Status};
use crate::valid_node_end;

/// Everything needed to start a transaction (spec.md §4.1).
pub struct BeginInput {
    pub options: TxnOptions,
    pub connect_reply: ConnectReply,
    pub url_rules: RuleSet,
    pub txn_rules: RuleSet,
    pub segment_terms: SegmentTermsTable,
    pub distributed_tracing_sampled: bool,
}

/// What finalisation hands back for the collector to harvest (spec.md
/// §4.7-§4.8).
pub struct FinalizedTxn {
    pub name: String,
    pub intrinsics: Intrinsics,
    pub trace_payload: Option<serde_json::Value>,
    pub span_events: Vec<SpanEvent>,
}

pub struct Txn {
    pub options: TxnOptions,
    pub status: Status,
    pub type_flags: TxnTypeFlags,
    pub guid: String,
    pub dt: DtState,

    path: String,
    name: Option<String>,
    frozen_apdex_t: Option<Duration>,

    url_rules: RuleSet,
    txn_rules: RuleSet,
    segment_terms: SegmentTermsTable,
    connect_reply: ConnectReply,

    clock: Clock,
    txn_start: Timestamp,
    arena: SegmentArena,
    strings: StringPool,

    pub scoped_metrics: MetricTable,
    pub unscoped_metrics: MetricTable,
    pub slowsqls: SlowSqlStore,
    pub custom_events: CustomEventRing,
    pub attributes: AttributeStore,
    pub error: ErrorSlot,

    datastore_products: Vec<String>,
    datastore_duration_by_vendor: HashMap<String, Duration>,
    external_duration_by_host: HashMap<String, Duration>,
    root_kids_duration: Duration,
    async_duration: Duration,

    ended: bool,
}

impl Txn {
    /// spec.md §4.1 `begin`: seeds DT state, joins in no security policy by
    /// default (callers that need the join call
    /// [`crate::options::join_security_policies`] first and pass the result
    /// in via `input.options`), and opens the root segment.
    pub fn begin(input: BeginInput, start_when: i64) -> Self {
        let mut clock = Clock::new();
        let txn_start = clock.tick(start_when);
        let arena = SegmentArena::new(txn_start);
        let dt = DtState::seed(
            input.options.distributed_tracing_enabled,
            &input.connect_reply,
            input.distributed_tracing_sampled,
        );

        Txn {
            scoped_metrics: MetricTable::new(MetricTable::DEFAULT_LIMIT),
            unscoped_metrics: MetricTable::new(MetricTable::DEFAULT_LIMIT),
            slowsqls: SlowSqlStore::new(SlowSqlStore::DEFAULT_CAPACITY),
            custom_events: CustomEventRing::new(if input.options.custom_events_enabled { 10_000 } else { 0 }),
            attributes: AttributeStore::new(),
            error: ErrorSlot::new(),
            options: input.options,
            status: Status::new(),
            type_flags: TxnTypeFlags::empty(),
            guid: new_guid(),
            dt,
            path: String::new(),
            name: None,
            frozen_apdex_t: None,
            url_rules: input.url_rules,
            txn_rules: input.txn_rules,
            segment_terms: input.segment_terms,
            connect_reply: input.connect_reply,
            clock,
            txn_start,
            arena,
            strings: StringPool::new(),
            datastore_products: Vec::new(),
            datastore_duration_by_vendor: HashMap::new(),
            external_duration_by_host: HashMap::new(),
            root_kids_duration: Duration::ZERO,
            async_duration: Duration::ZERO,
            ended: false,
        }
    }

    pub fn tick(&mut self, when: i64) -> Timestamp {
        self.clock.tick(when)
    }

    pub fn txn_start(&self) -> Timestamp {
        self.txn_start
    }

    pub fn root(&self) -> SegmentId {
        self.arena.root()
    }

    pub fn accept_inbound_dt(&mut self, payload: DtInboundPayload) {
        self.type_flags.set(TxnTypeFlags::DT_INBOUND, true);
        self.dt.accept_inbound(payload);
    }

    pub fn set_queue_start(&mut self, queue_start: Timestamp) {
        self.status.queue_start = Some(queue_start);
    }

    /// spec.md §4.2 `start`.
    pub fn start_segment(&mut self, start: Timestamp, explicit_parent: Option<SegmentId>) -> SegmentId {
        self.arena.start(start, explicit_parent)
    }

    /// spec.md §4.2 `end`. Returns `false` if the segment was already ended.
    pub fn end_segment(&mut self, id: SegmentId, stop: Timestamp) -> bool {
        self.arena.end(id, stop)
    }

    pub fn set_parent(&mut self, id: SegmentId, new_parent: SegmentId) -> bool {
        self.arena.set_parent(id, new_parent)
    }

    pub fn set_segment_name(&mut self, id: SegmentId, name: &str) {
        let string_id = self.strings.intern(name);
        self.arena.set_name(id, string_id);
    }

    pub fn set_segment_user_attribute(&mut self, id: SegmentId, key: &str, value: AttributeValue) {
        self.arena.get_mut(id).user_attributes.insert(key.to_string(), value);
    }

    /// spec.md §4.5: the URI/Action/Function/Custom naming entry points all
    /// fold into this, differing only in `PathType` and whether the caller
    /// already supplies a rewritten path.
    pub fn set_path(&mut self, path_type: PathType, path: &str, ok_to_overwrite: bool) {
        if self.status.set_path_type(path_type, ok_to_overwrite) {
            self.path = path.to_string();
        }
    }

    pub fn set_background(&mut self, background: bool) -> bool {
        let applied = self.status.set_background(background);
        if !applied {
            self.bump_supportability(apm_metrics::SupportabilityCounter::BackgroundStatusChangePrevented);
        }
        applied
    }

    /// Internal `Supportability/...` counters (SPEC_FULL.md §2): zero-
    /// duration, always-forced timed metrics so they never get crowded out
    /// by the transaction's own metric table limit.
    fn bump_supportability(&mut self, counter: apm_metrics::SupportabilityCounter) {
        self.unscoped_metrics.add_timed(counter.metric_name(), Duration::ZERO, Duration::ZERO, true);
    }

    /// Runs the naming pipeline now (spec.md §4.5 steps 2-8) if not already
    /// frozen, caching the result. Transactions typically call this once,
    /// lazily, right before the first thing that needs the finished name
    /// (a trace/event harvest, or an explicit freeze request).
    pub fn resolve_name(&mut self) -> Option<&str> {
        if self.name.is_none() {
            match name_transaction(
                &mut self.status,
                &self.path,
                &self.url_rules,
                &self.txn_rules,
                &self.segment_terms,
                &self.connect_reply,
            ) {
                NameResult::Named { name, apdex_t } => {
                    self.frozen_apdex_t = apdex_t.or(Some(self.options.apdex_t));
                    if self.options.tt_is_apdex_f {
                        self.options.tt_threshold = Duration::from_micros(self.frozen_apdex_t.unwrap().as_micros() * 4);
                    }
                    self.name = Some(name);
                }
                NameResult::Ignore => {}
            }
        }
        self.name.as_deref()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn terminate_datastore_segment(
        &mut self,
        host: &dyn DatastoreHost,
        id: SegmentId,
        start: Timestamp,
        stop: Timestamp,
        vendor: DatastoreVendor,
        vendor_str: Option<&str>,
        input: DatastoreInput,
    ) -> bool {
        let vendor_name = vendor.canonical_name(vendor_str);
        let ok = terminate_datastore(
            host,
            &mut self.arena,
            &mut self.strings,
            id,
            start,
            stop,
            vendor,
            vendor_str,
            input,
            &mut self.datastore_products,
            &mut self.scoped_metrics,
            &mut self.unscoped_metrics,
            &mut self.slowsqls,
            &mut self.root_kids_duration,
            &self.options,
            self.txn_start,
            self.status.recording,
        );
        if ok {
            if let Some(name) = vendor_name {
                let entry = self.datastore_duration_by_vendor.entry(name).or_insert(Duration::ZERO);
                *entry = *entry + stop.delta(start);
            }
        }
        ok
    }

    #[allow(clippy::too_many_arguments)]
    pub fn terminate_external_segment(
        &mut self,
        id: SegmentId,
        start: Timestamp,
        stop: Timestamp,
        url: &str,
        do_rollup: bool,
        cat: Option<CatResponse>,
    ) -> bool {
        let host = crate::external::extract_domain(url).unwrap_or_else(|| "<unknown>".to_string());
        let ok = terminate_external(
            &mut self.arena,
            &mut self.strings,
            id,
            start,
            stop,
            url,
            None,
            do_rollup,
            cat,
            &mut self.scoped_metrics,
            &mut self.unscoped_metrics,
            &mut self.root_kids_duration,
            self.txn_start,
            self.status.recording,
        );
        if ok {
            let entry = self.external_duration_by_host.entry(host).or_insert(Duration::ZERO);
            *entry = *entry + stop.delta(start);
        }
        ok
    }

    /// spec.md §3.6 / §7 `RecordedError`: replaces the stored error only if
    /// `priority` is strictly higher than whatever is already recorded.
    pub fn record_error(&mut self, klass: &str, message: &str, priority: i32, span_id: Option<String>) -> bool {
        self.error.record(RecordedError {
            klass: klass.to_string(),
            message: message.to_string(),
            priority,
            span_id,
        })
    }

    pub fn valid_node_end(&self, start: Timestamp, stop: Timestamp) -> bool {
        valid_node_end(self.status.recording, self.txn_start, start, stop)
    }

    /// spec.md §4.7/§4.8 `end`: closes the root segment if still open,
    /// finalises metrics, and assembles the trace/span-event payloads a
    /// harvest would carry. Idempotent past the first call.
    pub fn end(&mut self, stop: Timestamp, cpu: CpuTime) -> FinalizedTxn {
        if !self.ended {
            self.arena.end(self.arena.root(), stop);
            self.ended = true;
        }
        self.resolve_name();
        let name = self.name.clone().unwrap_or_else(|| "WebTransaction/Uri/unknown".to_string());

        let root = self.arena.get(self.arena.root());
        let duration = root.stop_time.map(|s| s.delta(root.start_time)).unwrap_or(Duration::ZERO);
        let total_time = duration + self.async_duration;
        let apdex_t = self.frozen_apdex_t.unwrap_or(self.options.apdex_t);
        let had_error = self.error.is_some();

        // spec.md §8 scenario 5: an ignored transaction (URL rule, or an
        // explicit `status.ignore`) emits no metrics and no trace at all,
        // not just a name-less one.
        let intrinsics = if self.status.ignore {
            Intrinsics::default()
        } else {
            finalize(
                &mut self.unscoped_metrics,
                &name,
                self.status.background,
                duration,
                self.root_kids_duration,
                total_time,
                if self.status.ignore_apdex { None } else { Some(apdex_t) },
                self.status.ignore_apdex,
                had_error,
                self.status.queue_start,
                self.txn_start,
                cpu,
                &self.datastore_products,
                &self.datastore_duration_by_vendor,
                &self.external_duration_by_host,
                &self.dt,
                &self.options,
            )
        };

        let trace_payload = if self.options.tt_enabled && !self.status.ignore {
            let agent_attrs = self.attributes.agent_for(AttributeDestination::TraceOnly);
            let user_attrs = self.attributes.user_for(AttributeDestination::TraceOnly);
            let mut intrinsics_attrs: HashMap<String, AttributeValue> = HashMap::new();
            intrinsics_attrs.insert("totalTime".to_string(), intrinsics.total_time.as_secs_f64().into());
            build_trace_payload(
                &self.arena,
                &mut self.strings,
                &name,
                self.async_duration.as_micros() != 0,
                self.arena.len(),
                &agent_attrs,
                &user_attrs,
                &intrinsics_attrs,
            )
        } else {
            None
        };

        let span_events = if self.options.span_events_enabled && !self.status.ignore {
            let root_id = self.arena.root();
            sample_span_events(&mut self.arena, &self.strings, 1_000, root_id)
        } else {
            Vec::new()
        };

        FinalizedTxn {
            name,
            intrinsics,
            trace_payload,
            span_events,
        }
    }
}
