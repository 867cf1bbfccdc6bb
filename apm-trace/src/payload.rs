//! Trace-payload JSON emission (spec.md §6.2), bit-exact where the format
//! doc calls for it: root node, nested segment array, and an interned
//! string table serialised as a parallel array.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use apm_base::AttributeValue;
use apm_segment::{SegmentArena, SegmentId};
use apm_strings::StringPool;
use apm_time::Timestamp;

/// spec.md §8 boundary: beyond this many segments, trace emission is
/// disabled outright (no sampling-down, just no trace) though metrics are
/// unaffected.
pub const MAX_TRACE_SEGMENTS: usize = 2000;

fn attrs_to_json(attrs: &HashMap<String, AttributeValue>) -> Map<String, Value> {
    attrs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect()
}

/// Builds one `[start_ms, stop_ms, "`idx", params, [children]]` node.
/// `async_duration_nonzero` controls whether `async_context` is folded into
/// `params` (spec.md §6.2: "The literal `async_context` is not interned").
/// Both `name` and `async_context` are interned before a trace is assembled
/// (at segment-naming time), so this only ever reads the pool.
fn node_to_json(
    arena: &SegmentArena,
    strings: &StringPool,
    id: SegmentId,
    root_start: Timestamp,
    async_duration_nonzero: bool,
) -> Value {
    let segment = arena.get(id);
    let start_ms = segment.start_time.offset_ms(root_start);
    let stop_ms = segment
        .stop_time
        .map(|s| s.offset_ms(root_start))
        .unwrap_or(start_ms)
        .max(start_ms);

    let mut params = attrs_to_json(&segment.user_attributes);
    if segment.async_context.is_set() && async_duration_nonzero {
        if let Some(idx) = segment.async_context.emission_index() {
            let mut with_ctx = Map::new();
            with_ctx.insert("async_context".to_string(), json!(format!("`{idx}")));
            for (k, v) in params {
                with_ctx.insert(k, v);
            }
            params = with_ctx;
        }
    }

    let children: Vec<Value> = segment
        .children()
        .iter()
        .map(|child| node_to_json(arena, strings, *child, root_start, async_duration_nonzero))
        .collect();

    json!([
        start_ms,
        stop_ms,
        format!("`{}", segment.name.emission_index().unwrap_or(0)),
        params,
        children
    ])
}

/// Assemble the full trace payload, or `None` if the transaction has no
/// completed root, zero duration, or more than [`MAX_TRACE_SEGMENTS`]
/// segments.
pub fn build_trace_payload(
    arena: &SegmentArena,
    strings: &mut StringPool,
    txn_name: &str,
    async_duration_nonzero: bool,
    segment_count: usize,
    agent_attributes: &HashMap<String, AttributeValue>,
    user_attributes: &HashMap<String, AttributeValue>,
    intrinsics: &HashMap<String, AttributeValue>,
) -> Option<Value> {
    if segment_count > MAX_TRACE_SEGMENTS {
        tracing::debug!(target: "apm_txn", segment_count, "trace emission disabled: segment count over limit");
        return None;
    }
    let root_id = arena.root();
    let root = arena.get(root_id);
    let stop = root.stop_time?;
    let root_start = root.start_time;
    let duration_ms = stop.offset_ms(root_start);
    if duration_ms <= 0.0 {
        return None;
    }

    let txn_name_idx = strings.intern(txn_name);
    let txn_children: Vec<Value> = root
        .children()
        .iter()
        .map(|child| node_to_json(arena, strings, *child, root_start, async_duration_nonzero))
        .collect();

    let txn_node = json!([
        0,
        duration_ms,
        format!("`{}", txn_name_idx.emission_index().unwrap_or(0)),
        Map::<String, Value>::new(),
        txn_children
    ]);

    let root_node = json!([0, duration_ms, "ROOT", {}, [txn_node]]);

    let mut metadata = Map::new();
    if !agent_attributes.is_empty() {
        metadata.insert("agentAttributes".to_string(), Value::Object(attrs_to_json(agent_attributes)));
    }
    if !user_attributes.is_empty() {
        metadata.insert("userAttributes".to_string(), Value::Object(attrs_to_json(user_attributes)));
    }
    if !intrinsics.is_empty() {
        metadata.insert("intrinsics".to_string(), Value::Object(attrs_to_json(intrinsics)));
    }

    let entry = json!([0.0, {}, {}, root_node, metadata]);
    let string_table: Vec<&str> = strings.iter_ordered().collect();

    Some(json!([[entry], string_table]))
}
