//! Distributed-trace state (spec.md §3.1 `distributed_trace`), "opaque to
//! the core beyond the hooks in §4.1": the core only seeds/reads it and
//! folds it into finalisation rollups (spec.md §4.7), never interprets or
//! signs the wire payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The subset of a collector's connect-reply the transaction lifecycle
/// reads at `begin`/naming (spec.md §4.1, §4.5 step 8).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConnectReply {
    pub trusted_account_key: Option<String>,
    pub account_id: Option<String>,
    pub primary_application_id: Option<String>,
    pub web_transactions_apdex: HashMap<String, f64>,
    pub display_host: Option<String>,
}

/// A decoded inbound distributed-trace payload (spec.md §1: "the core only
/// consumes a decoded object", never parses the wire header itself).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DtInboundPayload {
    pub trace_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub parent_account_id: Option<String>,
    pub parent_app_id: Option<String>,
    pub parent_type: Option<String>,
    pub transport_type: Option<String>,
    pub sampled: Option<bool>,
    pub priority: Option<f64>,
    /// Wall-clock microseconds at which the caller recorded/sent the
    /// payload, in the same clock the host's `txn_start` comes from. Feeds
    /// `TransportDuration` (spec.md §4.7).
    pub timestamp_when: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct DtState {
    pub enabled: bool,
    pub trace_id: String,
    pub txn_guid: String,
    pub sampled: bool,
    pub priority: f64,
    pub account_id: Option<String>,
    pub trusted_key: Option<String>,
    pub primary_app_id: Option<String>,
    pub inbound: Option<DtInboundPayload>,
}

impl DtState {
    /// Seed fresh DT state at `begin` (spec.md §4.1): "new txn-id =
    /// trace-id = a fresh GUID; trusted-key/account-id/primary-app-id
    /// taken from the connect reply".
    pub fn seed(enabled: bool, reply: &ConnectReply, sampled: bool) -> Self {
        let guid = crate::guid::new_guid();
        DtState {
            enabled,
            trace_id: guid.clone(),
            txn_guid: guid,
            sampled,
            priority: crate::guid::initial_priority(sampled),
            account_id: reply.account_id.clone(),
            trusted_key: reply.trusted_account_key.clone(),
            primary_app_id: reply.primary_application_id.clone(),
            inbound: None,
        }
    }

    /// Accept an inbound DT payload (spec.md §4.7: "accepted inbound
    /// payload" feeds `TransportDuration`). Adopts the caller's trace id
    /// and sampling/priority decision when present.
    pub fn accept_inbound(&mut self, payload: DtInboundPayload) {
        if let Some(trace_id) = &payload.trace_id {
            self.trace_id = trace_id.clone();
        }
        if let Some(sampled) = payload.sampled {
            self.sampled = sampled;
        }
        if let Some(priority) = payload.priority {
            self.priority = priority;
        }
        self.inbound = Some(payload);
    }

    pub fn caller_type(&self) -> &str {
        self.inbound
            .as_ref()
            .and_then(|i| i.parent_type.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn caller_account(&self) -> &str {
        self.inbound
            .as_ref()
            .and_then(|i| i.parent_account_id.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn caller_app(&self) -> &str {
        self.inbound
            .as_ref()
            .and_then(|i| i.parent_app_id.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn caller_transport(&self) -> &str {
        self.inbound
            .as_ref()
            .and_then(|i| i.transport_type.as_deref())
            .unwrap_or("Unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_copies_connect_reply_identity() {
        let reply = ConnectReply {
            account_id: Some("123".to_string()),
            trusted_account_key: Some("key".to_string()),
            primary_application_id: Some("app".to_string()),
            ..Default::default()
        };
        let dt = DtState::seed(true, &reply, true);
        assert_eq!(dt.account_id.as_deref(), Some("123"));
        assert_eq!(dt.trace_id, dt.txn_guid);
        assert!(dt.priority >= 1.0);
    }

    #[test]
    fn missing_inbound_fields_degrade_to_unknown() {
        let dt = DtState::seed(true, &ConnectReply::default(), false);
        assert_eq!(dt.caller_type(), "Unknown");
        assert_eq!(dt.caller_account(), "Unknown");
    }

    #[test]
    fn accepting_inbound_adopts_trace_id_and_sampling() {
        let mut dt = DtState::seed(true, &ConnectReply::default(), false);
        dt.accept_inbound(DtInboundPayload {
            trace_id: Some("abc".to_string()),
            sampled: Some(true),
            priority: Some(2.5),
            parent_type: Some("App".to_string()),
            ..Default::default()
        });
        assert_eq!(dt.trace_id, "abc");
        assert!(dt.sampled);
        assert_eq!(dt.priority, 2.5);
        assert_eq!(dt.caller_type(), "App");
    }
}
