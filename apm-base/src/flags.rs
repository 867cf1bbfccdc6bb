/// The transaction `type` bitset from spec.md §3.1: a small set of
/// independent markers rather than a priority level, so plain bit twiddling
/// (in the style of `Bitmap256`, just right-sized) is clearer than an enum.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct TxnTypeFlags(u8);

impl TxnTypeFlags {
    pub const SYNTHETICS: TxnTypeFlags = TxnTypeFlags(1 << 0);
    pub const CAT_INBOUND: TxnTypeFlags = TxnTypeFlags(1 << 1);
    pub const CAT_OUTBOUND: TxnTypeFlags = TxnTypeFlags(1 << 2);
    pub const DT_INBOUND: TxnTypeFlags = TxnTypeFlags(1 << 3);
    pub const DT_OUTBOUND: TxnTypeFlags = TxnTypeFlags(1 << 4);

    pub fn empty() -> Self {
        TxnTypeFlags(0)
    }

    pub fn set(&mut self, flag: TxnTypeFlags, val: bool) {
        if val {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    pub fn get(&self, flag: TxnTypeFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn union(&mut self, other: TxnTypeFlags) {
        self.0 |= other.0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
