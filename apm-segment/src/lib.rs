mod arena;
mod async_context;
mod node;
mod typed_attributes;

pub use arena::{SegmentArena, SegmentId};
pub use async_context::AsyncContext;
pub use node::{Color, Segment};
pub use typed_attributes::{
    non_empty, DatastoreAttributes, ExternalAttributes, InstanceAttributes, SegmentKind,
    TypedAttributes,
};
