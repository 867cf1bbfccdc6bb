//! The segment tree as an arena (spec.md §9 design notes): every segment
//! born in a transaction lives in one `Vec`, parents and children are
//! indices rather than owning/back-references, and the whole tree is freed
//! in one shot when the arena (owned by the transaction) drops. This
//! sidesteps the "what owns a back-reference" hazard a cyclic parent
//! pointer would otherwise create, and it also means cross-transaction
//! re-parenting (forbidden by spec.md §4.2) is not just validated, it is
//! unrepresentable: a [`SegmentId`] only indexes its own arena.

use apm_time::{Duration, Timestamp};

use crate::node::{Color, Segment};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SegmentId(u32);

impl SegmentId {
    /// Raw arena index, stable for the lifetime of the transaction. Used to
    /// derive deterministic span-event guids and sort orders; never exposed
    /// across transactions since a `SegmentId` only indexes its own arena.
    pub fn ordinal(&self) -> u32 {
        self.0
    }
}

/// The segment tree plus the current-segment stack (spec.md §3.1), both
/// scoped to one transaction.
#[derive(Debug)]
pub struct SegmentArena {
    nodes: Vec<Segment>,
    root: SegmentId,
    stack: Vec<SegmentId>,
}

impl SegmentArena {
    /// Allocate the arena and its root segment, starting at `start_time`,
    /// and push the root onto the current-segment stack.
    pub fn new(start_time: Timestamp) -> Self {
        let root_id = SegmentId(0);
        let root = Segment::new(start_time, None, Color::White);
        SegmentArena {
            nodes: vec![root],
            root: root_id,
            stack: vec![root_id],
        }
    }

    pub fn root(&self) -> SegmentId {
        self.root
    }

    pub fn get(&self, id: SegmentId) -> &Segment {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SegmentId) -> &mut Segment {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn current_top(&self) -> Option<SegmentId> {
        self.stack.last().copied()
    }

    fn root_color(&self) -> Color {
        self.get(self.root).color
    }

    /// spec.md §4.2 `start`. Resolves the implicit parent from the
    /// current-segment stack when `explicit_parent` is `None`, and pushes
    /// the new segment onto that stack in that case only.
    pub fn start(&mut self, start_time: Timestamp, explicit_parent: Option<SegmentId>) -> SegmentId {
        let color = self.root_color();
        let parent = explicit_parent.or_else(|| self.current_top());
        let id = SegmentId(self.nodes.len() as u32);
        self.nodes.push(Segment::new(start_time, parent, color));
        if let Some(p) = parent {
            self.get_mut(p).children.push(id);
        }
        if explicit_parent.is_none() {
            self.stack.push(id);
        }
        id
    }

    /// spec.md §4.2 `end`. Returns `true` if this call actually set
    /// `stop_time` (i.e. it was not already fixed by `set_timing` or a
    /// prior `end`).
    pub fn end(&mut self, id: SegmentId, stop_time: Timestamp) -> bool {
        let set_now = self.get(id).stop_time.is_none();
        if set_now {
            self.get_mut(id).stop_time = Some(stop_time);
        }
        if self.current_top() == Some(id) {
            self.stack.pop();
        }
        set_now
    }

    pub fn set_name(&mut self, id: SegmentId, name: apm_strings::StringId) {
        self.get_mut(id).name = name;
    }

    /// spec.md §4.2 `set_timing`: overrides both start and stop and locks
    /// `stop_time` against a later `end()` override. Setting the same
    /// parent via [`Self::set_parent`] and re-timing twice are both
    /// idempotent/overriding, matching the spec's "subsequent `end` must
    /// not re-override stop" contract.
    pub fn set_timing(&mut self, id: SegmentId, start: Timestamp, duration: Duration) {
        let node = self.get_mut(id);
        node.start_time = start;
        node.stop_time = Some(Timestamp::new(
            start.when() + duration.as_micros(),
            start.stamp(),
        ));
        node.timing_locked = true;
    }

    /// spec.md §4.2 `set_parent`. Detaches from the old parent's children
    /// and appends to the new parent's; a no-op success if `new_parent` is
    /// already the current parent. Returns `false` only if `id` is the
    /// root (which has no parent slot to rewrite).
    pub fn set_parent(&mut self, id: SegmentId, new_parent: SegmentId) -> bool {
        if id == self.root {
            return false;
        }
        let old_parent = self.get(id).parent;
        if old_parent == Some(new_parent) {
            return true;
        }
        if let Some(old) = old_parent {
            self.get_mut(old).children.retain(|c| *c != id);
        }
        self.get_mut(id).parent = Some(new_parent);
        self.get_mut(new_parent).children.push(id);
        true
    }

    /// spec.md §4.4: cycle-tolerant pre-order traversal via two-colour
    /// marking. Visits each node reachable from `start` exactly once,
    /// regardless of cycles induced by re-parenting, and leaves the tree
    /// ready for the next traversal to toggle colours back.
    pub fn traverse_preorder<F: FnMut(SegmentId, &Segment)>(&mut self, start: SegmentId, mut visit: F) {
        let reset = self.get(start).color;
        let set = reset.opposite();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if self.get(id).color != reset {
                continue;
            }
            self.get_mut(id).color = set;
            visit(id, self.get(id));
            for child in self.get(id).children.iter().rev().copied().collect::<Vec<_>>() {
                stack.push(child);
            }
        }
    }
}
