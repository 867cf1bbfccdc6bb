use std::collections::HashMap;

use apm_base::AttributeValue;
use apm_strings::StringId;
use apm_time::Timestamp;

use crate::typed_attributes::TypedAttributes;

/// Two-colour traversal marker (spec.md §4.4, §9). New segments are painted
/// to match the root's *current* colour at creation time, so the next
/// traversal (whose reset colour is read off the root) will still visit
/// them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    White,
    Grey,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::White => Color::Grey,
            Color::Grey => Color::White,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::White
    }
}

/// A single timed scope in the transaction (spec.md §3.2, component C).
/// `parent`/`children` are arena indices ([`crate::arena::SegmentId`]),
/// not owning pointers — see `crate::arena` for why.
#[derive(Clone, Debug)]
pub struct Segment {
    pub(crate) parent: Option<crate::arena::SegmentId>,
    pub(crate) children: Vec<crate::arena::SegmentId>,
    pub(crate) color: Color,

    pub start_time: Timestamp,
    pub stop_time: Option<Timestamp>,
    /// Set once by `set_timing`; `end` must not override stop after this.
    pub(crate) timing_locked: bool,

    pub name: StringId,
    pub async_context: StringId,

    pub user_attributes: HashMap<String, AttributeValue>,
    pub typed_attributes: TypedAttributes,

    /// Forces a particular span-event id, used by outbound DT to pair a
    /// payload with the about-to-end segment (spec.md §3.2).
    pub forced_id: Option<String>,
}

impl Segment {
    pub(crate) fn new(start_time: Timestamp, parent: Option<crate::arena::SegmentId>, color: Color) -> Self {
        Segment {
            parent,
            children: Vec::new(),
            color,
            start_time,
            stop_time: None,
            timing_locked: false,
            name: StringId::UNSET,
            async_context: StringId::UNSET,
            user_attributes: HashMap::new(),
            typed_attributes: TypedAttributes::Custom,
            forced_id: None,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.stop_time.is_some()
    }

    pub fn parent(&self) -> Option<crate::arena::SegmentId> {
        self.parent
    }

    pub fn children(&self) -> &[crate::arena::SegmentId] {
        &self.children
    }
}
