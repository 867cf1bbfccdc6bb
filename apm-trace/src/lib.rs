mod heap;
mod payload;
mod span;

pub use heap::BoundedTopNHeap;
pub use payload::{build_trace_payload, MAX_TRACE_SEGMENTS};
pub use span::{sample_span_events, span_events_to_json, SpanEvent};
