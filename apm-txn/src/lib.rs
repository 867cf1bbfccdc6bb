//! Transaction lifecycle, typed node termination, and finalisation
//! (spec.md §3-§4, §6-§8). This crate owns the one thing none of its
//! dependencies can: a live [`Txn`] that mutates as the host application
//! runs, threading calls through to `apm-segment`'s arena, `apm-rules`'
//! naming pipeline, and `apm-trace`'s payload/span-event builders.

mod attributes;
pub mod datastore;
mod dt;
mod error_record;
mod external;
mod finalize;
mod guid;
mod naming;
mod options;
mod status;
mod txn;

pub use attributes::{AttributeDestination, AttributeStore};
pub use datastore::{terminate_datastore, DatastoreHost, DatastoreInput, DatastoreVendor};
pub use dt::{ConnectReply, DtInboundPayload, DtState};
pub use error_record::{ErrorSlot, RecordedError};
pub use external::{clean_url, extract_domain, terminate_external, CatResponse};
pub use finalize::{CpuTime, Intrinsics};
pub use guid::{initial_priority, new_guid};
pub use naming::NameResult;
pub use options::{join_security_policies, PolicyBool, PolicyBoolDefault, RecordSqlMode, SecurityPolicies, TxnOptions};
pub use status::{CrossProcessState, PathType, Status};
pub use txn::{BeginInput, FinalizedTxn, Txn};

use apm_time::Timestamp;

/// spec.md §4.8: a node's `[start, stop]` is only honoured if the
/// transaction is still recording, the node didn't start before the
/// transaction itself, and its interval isn't inverted. Shared by every
/// typed termination path (`terminate_datastore`, `terminate_external`) so
/// the drop decision is made exactly one way.
pub fn valid_node_end(recording: bool, txn_start: Timestamp, start: Timestamp, stop: Timestamp) -> bool {
    recording && start.when() >= txn_start.when() && stop.when() >= start.when() && stop.stamp() > start.stamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_time::Clock;

    #[test]
    fn rejects_when_not_recording() {
        let mut clock = Clock::new();
        let t0 = clock.tick(0);
        let t1 = clock.tick(1);
        assert!(!valid_node_end(false, t0, t0, t1));
    }

    #[test]
    fn rejects_node_starting_before_txn() {
        let mut clock = Clock::new();
        let txn_start = clock.tick(1_000);
        let before = clock.tick(0);
        let stop = clock.tick(2_000);
        assert!(!valid_node_end(true, txn_start, before, stop));
    }

    #[test]
    fn rejects_inverted_interval() {
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let start = clock.tick(1_000);
        let stop = clock.tick(500);
        assert!(!valid_node_end(true, txn_start, start, stop));
    }

    #[test]
    fn accepts_well_formed_interval() {
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let start = clock.tick(10);
        let stop = clock.tick(20);
        assert!(valid_node_end(true, txn_start, start, stop));
    }

    #[test]
    fn rejects_equal_stamps() {
        // Mirrors apm-segment's `set_timing`, which reuses `start`'s stamp
        // for the synthesized stop timestamp.
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let start = clock.tick(10);
        let stop = apm_time::Timestamp::new(20, start.stamp());
        assert!(!valid_node_end(true, txn_start, start, stop));
    }
}
