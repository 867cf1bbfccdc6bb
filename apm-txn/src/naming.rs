//! Orchestrates spec.md §4.5's naming pipeline: the prefix/freeze/key-txn
//! steps that need direct transaction state, wrapped around
//! `apm_rules::run_naming_pipeline` for the URL/transaction-rule/segment-term
//! steps that don't.

use apm_rules::{run_naming_pipeline, NamingInput, NamingOutcome, RuleSet, SegmentTermsTable};
use apm_time::Duration;

use crate::dt::ConnectReply;
use crate::status::{PathType, Status};

/// spec.md §4.5 step 2.
fn prefix_for(background: bool, path_type: PathType) -> &'static str {
    match (background, path_type) {
        (false, PathType::Uri) => "WebTransaction/Uri",
        (false, PathType::Action) => "WebTransaction/Action",
        (false, PathType::Function) => "WebTransaction/Function",
        (false, PathType::Custom) => "WebTransaction/Custom",
        (false, PathType::Unknown) => "WebTransaction/Uri",
        (true, PathType::Uri) => "OtherTransaction/php",
        (true, PathType::Action) => "OtherTransaction/Action",
        (true, PathType::Function) => "OtherTransaction/Function",
        (true, PathType::Custom) => "OtherTransaction/Custom",
        (true, PathType::Unknown) => "OtherTransaction/php",
    }
}

pub enum NameResult {
    Named { name: String, apdex_t: Option<Duration> },
    Ignore,
}

/// Runs the complete pipeline: prefix selection, conditional URL rules,
/// composition, transaction rules, segment terms, freeze, and key-transaction
/// apdex override (spec.md §4.5 steps 2-8).
#[allow(clippy::too_many_arguments)]
pub fn name_transaction(
    status: &mut Status,
    path: &str,
    url_rules: &RuleSet,
    txn_rules: &RuleSet,
    segment_terms: &SegmentTermsTable,
    connect_reply: &ConnectReply,
) -> NameResult {
    if status.ignore || status.path_is_frozen {
        return NameResult::Ignore;
    }

    let prefix = prefix_for(status.background, status.path_type);
    let apply_url_rules = matches!(status.path_type, PathType::Uri | PathType::Custom) && !status.background;
    let raw_path = if path.is_empty() { "unknown" } else { path };

    let outcome = run_naming_pipeline(NamingInput {
        prefix,
        raw_path,
        apply_url_rules,
        url_rules,
        txn_rules,
        segment_terms,
    });

    let name = match outcome {
        NamingOutcome::Ignore => {
            status.ignore = true;
            return NameResult::Ignore;
        }
        NamingOutcome::Named(name) => name,
    };

    status.path_is_frozen = true;

    let apdex_t = connect_reply
        .web_transactions_apdex
        .get(&name)
        .filter(|v| **v > 0.0)
        .map(|v| Duration::from_secs_f64(*v));

    NameResult::Named { name, apdex_t }
}
