//! An append-only string interning pool, keyed by insertion order.
//!
//! `submerge-coldb`'s `Heap::add` dedups a blob against everything inserted
//! so far with a linear `memchr::memmem::find` scan — cheap to write, but
//! its own doc comment flags it as "probably worth placing some limits or
//! switching to a different data structure" once the heap grows. Spec.md
//! §3.1/§6.5 put this pool on the hot path of every segment start and typed
//! termination, so here we take that suggestion and back the dedup with a
//! hash index instead, keeping the same "insertion-ordered, append-only"
//! contract.

use std::collections::HashMap;

/// An interned string's index into a [`StringPool`]. `0` means "unset" /
/// "absent" per spec.md §3.2 (`name`/`async_context` default to index 0).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StringId(u32);

impl StringId {
    pub const UNSET: StringId = StringId(0);

    pub fn is_set(&self) -> bool {
        self.0 != 0
    }

    /// 0-based position in the emitted JSON string table (spec.md §6.5:
    /// "agent index i serialises at array position i-1").
    pub fn emission_index(&self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0 as usize - 1)
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StringPool {
    index: HashMap<String, StringId>,
    strings: Vec<String>,
}

impl StringPool {
    pub fn new() -> Self {
        StringPool {
            index: HashMap::new(),
            strings: Vec::new(),
        }
    }

    /// Insert `s` if not already present, returning its (possibly
    /// newly-assigned) 1-based index. Idempotent: interning the same string
    /// twice returns the same [`StringId`] (spec.md §8 invariant 7).
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.index.get(s) {
            return *id;
        }
        self.strings.push(s.to_string());
        let id = StringId(self.strings.len() as u32);
        self.index.insert(s.to_string(), id);
        id
    }

    /// Look up without inserting; `StringId::UNSET` if absent.
    pub fn lookup(&self, s: &str) -> StringId {
        self.index.get(s).copied().unwrap_or(StringId::UNSET)
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        if id.0 == 0 {
            return None;
        }
        self.strings.get(id.0 as usize - 1).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate in insertion order, the order the JSON string table
    /// (spec.md §6.2) is emitted in.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut pool = StringPool::new();
        let a = pool.intern("foo");
        let b = pool.intern("foo");
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn unset_id_has_no_emission_index() {
        assert_eq!(StringId::UNSET.emission_index(), None);
        assert!(!StringId::UNSET.is_set());
    }

    #[test]
    fn lookup_without_insert_returns_unset() {
        let pool = StringPool::new();
        assert_eq!(pool.lookup("nope"), StringId::UNSET);
    }

    #[test]
    fn emission_order_matches_insertion() {
        let mut pool = StringPool::new();
        let a = pool.intern("alpha");
        let b = pool.intern("beta");
        assert_eq!(a.emission_index(), Some(0));
        assert_eq!(b.emission_index(), Some(1));
        let ordered: Vec<_> = pool.iter_ordered().collect();
        assert_eq!(ordered, vec!["alpha", "beta"]);
    }

    #[test]
    fn get_roundtrips_through_intern() {
        let mut pool = StringPool::new();
        let id = pool.intern("child name");
        assert_eq!(pool.get(id), Some("child name"));
    }
}
