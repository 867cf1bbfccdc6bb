//! The URL/transaction-rule portion of the naming pipeline (spec.md §4.5
//! steps 3, 4, 5, 6). Steps 2 (prefix from path type), 7 (freeze) and 8
//! (key-transaction apdex override) need direct access to transaction
//! state and live in `apm-txn` instead, which calls [`run_naming_pipeline`]
//! for the part that only needs strings and rule tables.

use crate::rule::{RuleOutcome, RuleSet};
use crate::segment_terms::SegmentTermsTable;

#[derive(Debug)]
pub struct NamingInput<'a> {
    pub prefix: &'a str,
    pub raw_path: &'a str,
    pub apply_url_rules: bool,
    pub url_rules: &'a RuleSet,
    pub txn_rules: &'a RuleSet,
    pub segment_terms: &'a SegmentTermsTable,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NamingOutcome {
    Named(String),
    Ignore,
}

/// Runs the path through URL rules (if requested), composes it with the
/// transaction's prefix, then through transaction rules and segment-term
/// whitelisting. Any `RuleOutcome::Ignore` along the way short-circuits to
/// [`NamingOutcome::Ignore`].
pub fn run_naming_pipeline(input: NamingInput) -> NamingOutcome {
    let path = if input.apply_url_rules {
        match input.url_rules.apply(input.raw_path) {
            RuleOutcome::Ignore => return NamingOutcome::Ignore,
            RuleOutcome::Changed(new) => new,
            RuleOutcome::Unchanged => input.raw_path.to_string(),
        }
    } else {
        input.raw_path.to_string()
    };

    let composed = compose(input.prefix, &path);

    let named = match input.txn_rules.apply(&composed) {
        RuleOutcome::Ignore => return NamingOutcome::Ignore,
        RuleOutcome::Changed(new) => new,
        RuleOutcome::Unchanged => composed,
    };

    NamingOutcome::Named(input.segment_terms.apply(&named))
}

fn compose(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}
