//! Span-event sampling (spec.md's "separate bounded heap selects span
//! events"), gated by `span_events_enabled`/`distributed_tracing_enabled` at
//! the call site (component M, `apm-txn`). A span event is a flattened,
//! per-segment record — unlike the trace payload it carries no children.

use serde::Serialize;
use serde_json::Value;

use apm_segment::{Segment, SegmentArena, SegmentId, SegmentKind};
use apm_strings::StringPool;
use apm_time::Timestamp;

use crate::heap::BoundedTopNHeap;

#[derive(Clone, Debug, Serialize)]
pub struct SpanEvent {
    pub name: String,
    pub category: &'static str,
    pub guid: String,
    pub parent_id: Option<String>,
    pub timestamp_ms: i64,
    pub duration_s: f64,
    pub entry_point: bool,
}

fn category_for(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::Datastore => "datastore",
        SegmentKind::External => "http",
        SegmentKind::Custom => "generic",
    }
}

fn segment_guid(id: SegmentId, segment: &Segment) -> String {
    segment
        .forced_id
        .clone()
        .unwrap_or_else(|| format!("segment-{}", id.ordinal()))
}

/// Walk the whole tree once, feeding every segment's duration into a
/// [`BoundedTopNHeap`], then build [`SpanEvent`]s only for the survivors.
/// `root_id` identifies the transaction's trace-root segment so it can be
/// flagged `nr.entryPoint`.
pub fn sample_span_events(
    arena: &mut SegmentArena,
    strings: &StringPool,
    capacity: usize,
    root_id: SegmentId,
) -> Vec<SpanEvent> {
    if capacity == 0 {
        return Vec::new();
    }
    let mut heap = BoundedTopNHeap::new(capacity);
    arena.traverse_preorder(arena.root(), |id, segment| {
        if let Some(stop) = segment.stop_time {
            let duration = stop.delta(segment.start_time);
            heap.offer(duration, id);
        }
    });
    let mut sampled: Vec<SegmentId> = heap.into_values();
    sampled.sort_by_key(|id| id.ordinal());

    sampled
        .into_iter()
        .map(|id| {
            let segment = arena.get(id);
            let name = strings.get(segment.name).unwrap_or("Unknown").to_string();
            let parent_id = segment.parent().map(|p| segment_guid(p, arena.get(p)));
            let stop = segment.stop_time.unwrap_or(segment.start_time);
            SpanEvent {
                name,
                category: category_for(segment.typed_attributes.kind()),
                guid: segment_guid(id, segment),
                parent_id,
                timestamp_ms: timestamp_ms(segment.start_time),
                duration_s: stop.delta(segment.start_time).as_secs_f64(),
                entry_point: id == root_id,
            }
        })
        .collect()
}

fn timestamp_ms(ts: Timestamp) -> i64 {
    ts.when() / 1_000
}

pub fn span_events_to_json(events: &[SpanEvent]) -> Value {
    serde_json::to_value(events).unwrap_or(Value::Array(Vec::new()))
}
