//! The options record consumed at `begin` (spec.md §6.1) and the
//! security-policy join that may downgrade it (spec.md §4.1).

use apm_time::Duration;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RecordSqlMode {
    None,
    Raw,
    Obfuscated,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxnOptions {
    pub custom_events_enabled: bool,
    pub synthetics_enabled: bool,
    pub instance_reporting_enabled: bool,
    pub database_name_reporting_enabled: bool,
    pub err_enabled: bool,
    pub error_events_enabled: bool,
    pub request_params_enabled: bool,
    pub autorum_enabled: bool,
    pub analytics_events_enabled: bool,
    pub tt_enabled: bool,
    pub ep_enabled: bool,
    pub tt_recordsql: RecordSqlMode,
    pub tt_slowsql: bool,
    pub apdex_t: Duration,
    pub tt_threshold: Duration,
    pub tt_is_apdex_f: bool,
    pub ep_threshold: Duration,
    pub ss_threshold: Duration,
    pub cross_process_enabled: bool,
    pub allow_raw_exception_messages: bool,
    pub custom_parameters_enabled: bool,
    pub distributed_tracing_enabled: bool,
    pub span_events_enabled: bool,
}

impl Default for TxnOptions {
    fn default() -> Self {
        TxnOptions {
            custom_events_enabled: true,
            synthetics_enabled: true,
            instance_reporting_enabled: true,
            database_name_reporting_enabled: true,
            err_enabled: true,
            error_events_enabled: true,
            request_params_enabled: false,
            autorum_enabled: false,
            analytics_events_enabled: true,
            tt_enabled: true,
            ep_enabled: false,
            tt_recordsql: RecordSqlMode::Obfuscated,
            tt_slowsql: true,
            apdex_t: Duration::from_secs_f64(0.5),
            tt_threshold: Duration::from_secs_f64(2.0),
            tt_is_apdex_f: true,
            ep_threshold: Duration::from_secs_f64(0.5),
            ss_threshold: Duration::from_secs_f64(0.5),
            cross_process_enabled: false,
            allow_raw_exception_messages: true,
            custom_parameters_enabled: true,
            distributed_tracing_enabled: false,
            span_events_enabled: false,
        }
    }
}

/// A value that may be absent in a decoded security-policies document,
/// distinguishing "policy says 0/1" from "policy silent" (spec.md §4.1:
/// "a policy value of 'unset' ... leaves the local option untouched").
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PolicyBool {
    Unset,
    Disabled,
    Enabled,
}

impl PolicyBool {
    fn apply(self, local: bool) -> bool {
        match self {
            PolicyBool::Unset => local,
            PolicyBool::Disabled => false,
            PolicyBool::Enabled => local,
        }
    }
}

/// The subset of an agent's security-policies document this layer reacts
/// to (spec.md §4.1). Only fields that can force a *stricter* setting than
/// what was requested locally; everything else is a pass-through.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct SecurityPolicies {
    pub record_sql: Option<bool>,
    pub allow_raw_exception_messages: PolicyBoolDefault,
    pub custom_events: PolicyBoolDefault,
    pub custom_parameters: PolicyBoolDefault,
    pub collect_analytics_events: PolicyBoolDefault,
    pub collect_custom_events: PolicyBoolDefault,
    pub collect_traces: PolicyBoolDefault,
    pub collect_errors: PolicyBoolDefault,
    pub collect_error_events: PolicyBoolDefault,
}

/// [`PolicyBool`] with a `Default` of `Unset`, since most deployments never
/// send a security-policies document at all.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PolicyBoolDefault(pub PolicyBool);

impl Default for PolicyBoolDefault {
    fn default() -> Self {
        PolicyBoolDefault(PolicyBool::Unset)
    }
}

/// Apply `policies` on top of locally-requested `opts`, producing the
/// effective options a transaction actually begins with (spec.md §4.1).
/// `record_sql == Some(false)` forces `tt_recordsql = None`; `Some(true)`
/// downgrades `Raw` to `Obfuscated`.
pub fn join_security_policies(mut opts: TxnOptions, policies: &SecurityPolicies) -> TxnOptions {
    match policies.record_sql {
        Some(false) => opts.tt_recordsql = RecordSqlMode::None,
        Some(true) if opts.tt_recordsql == RecordSqlMode::Raw => {
            opts.tt_recordsql = RecordSqlMode::Obfuscated;
            tracing::debug!(target: "apm_txn", "security policy downgraded tt_recordsql Raw -> Obfuscated");
        }
        _ => {}
    }
    opts.allow_raw_exception_messages =
        policies.allow_raw_exception_messages.0.apply(opts.allow_raw_exception_messages);
    opts.custom_events_enabled = policies.custom_events.0.apply(opts.custom_events_enabled);
    opts.custom_parameters_enabled = policies.custom_parameters.0.apply(opts.custom_parameters_enabled);
    opts.analytics_events_enabled = policies.collect_analytics_events.0.apply(opts.analytics_events_enabled);
    opts.custom_events_enabled = policies.collect_custom_events.0.apply(opts.custom_events_enabled);
    if policies.collect_traces.0 == PolicyBool::Disabled {
        opts.tt_enabled = false;
        opts.ep_enabled = false;
        opts.tt_slowsql = false;
        tracing::debug!(target: "apm_txn", "security policy disabled traces/explain-plans/slowsql");
    }
    opts.err_enabled = policies.collect_errors.0.apply(opts.err_enabled);
    opts.error_events_enabled = policies.collect_error_events.0.apply(opts.error_events_enabled);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_policy_leaves_option_untouched() {
        let opts = TxnOptions::default();
        let policies = SecurityPolicies::default();
        let joined = join_security_policies(opts.clone(), &policies);
        assert_eq!(joined.tt_recordsql, opts.tt_recordsql);
    }

    #[test]
    fn record_sql_false_forces_none() {
        let opts = TxnOptions::default();
        let mut policies = SecurityPolicies::default();
        policies.record_sql = Some(false);
        let joined = join_security_policies(opts, &policies);
        assert_eq!(joined.tt_recordsql, RecordSqlMode::None);
    }

    #[test]
    fn record_sql_true_downgrades_raw_to_obfuscated() {
        let mut opts = TxnOptions::default();
        opts.tt_recordsql = RecordSqlMode::Raw;
        let mut policies = SecurityPolicies::default();
        policies.record_sql = Some(true);
        let joined = join_security_policies(opts, &policies);
        assert_eq!(joined.tt_recordsql, RecordSqlMode::Obfuscated);
    }

    #[test]
    fn collect_traces_disabled_forces_off_tt_ep_slowsql() {
        let opts = TxnOptions::default();
        let mut policies = SecurityPolicies::default();
        policies.collect_traces = PolicyBoolDefault(PolicyBool::Disabled);
        let joined = join_security_policies(opts, &policies);
        assert!(!joined.tt_enabled);
        assert!(!joined.ep_enabled);
        assert!(!joined.tt_slowsql);
    }
}
