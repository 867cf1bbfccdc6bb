//! A bounded top-N selector by [`apm_time::Duration`], grounded on the
//! original agent's `util_minmax_heap`/`nr_segment_heap_create`: rather than
//! keep every segment, hold only the `capacity` longest-running ones seen so
//! far, evicting the current minimum whenever a longer one arrives.
//!
//! `std::collections::BinaryHeap` is a max-heap; wrapping the ordering with
//! [`std::cmp::Reverse`] turns "peek the smallest" into O(1) and "evict the
//! smallest" into O(log n), which is exactly the one operation this bounded
//! selector needs on its non-entrant side.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use apm_time::Duration;

struct Entry<T> {
    duration: Duration,
    value: T,
}

impl<T> Eq for Entry<T> {}
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.duration == other.duration
    }
}
impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.duration.cmp(&other.duration)
    }
}
impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Retains the `capacity` entries with the largest [`Duration`] out of
/// everything offered to it, in the style of `nr_segment_heap_create`
/// (spec.md §6's "bounded min-max heap").
pub struct BoundedTopNHeap<T> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Entry<T>>>,
}

impl<T> BoundedTopNHeap<T> {
    pub fn new(capacity: usize) -> Self {
        BoundedTopNHeap {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn is_unbounded_capacity(&self) -> bool {
        self.capacity == 0
    }

    /// Offer a candidate. When at capacity, only displaces the current
    /// minimum if `duration` is strictly larger, matching
    /// `nr_segment_wrapped_duration_comparator`'s tie-break (ties favour
    /// whatever is already resident).
    pub fn offer(&mut self, duration: Duration, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(Entry { duration, value }));
            return;
        }
        if let Some(Reverse(min)) = self.heap.peek() {
            if duration > min.duration {
                self.heap.pop();
                self.heap.push(Reverse(Entry { duration, value }));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drain into the retained values, in no particular order — callers
    /// that need the sampled set typically only check membership.
    pub fn into_values(self) -> Vec<T> {
        self.heap.into_iter().map(|Reverse(e)| e.value).collect()
    }
}
