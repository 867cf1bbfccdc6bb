//! URL rules and transaction rules (spec.md §4.5 steps 3 & 5), modelled as a
//! tree-shaped sequence of match/replace rules in the style of
//! `submerge-lang`'s `Path`/`Expr` — each rule is a small node the pipeline
//! walks in order, rather than a single monolithic regex.
//!
//! Rule flags beyond the three-outcome contract spec.md gives the pipeline
//! (SPEC_FULL.md §2, grounded on the original agent's `nrrule_t`):
//! `terminate_chain` stops evaluating further rules once this one matches,
//! `each_segment` applies the pattern to each `/`-separated path segment
//! independently, and `replace_all` substitutes every match instead of only
//! the first.

use regex::Regex;

use apm_base::{err, Result};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RuleOutcome {
    Unchanged,
    Changed(String),
    Ignore,
}

#[derive(Debug)]
pub struct Rule {
    order: i32,
    regex: Regex,
    replacement: String,
    ignore: bool,
    terminate_chain: bool,
    each_segment: bool,
    replace_all: bool,
}

impl Rule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order: i32,
        pattern: &str,
        replacement: &str,
        ignore: bool,
        terminate_chain: bool,
        each_segment: bool,
        replace_all: bool,
    ) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|e| err(format!("invalid rule pattern {pattern:?}: {e}")))?;
        Ok(Rule {
            order,
            regex,
            replacement: replacement.to_string(),
            ignore,
            terminate_chain,
            each_segment,
            replace_all,
        })
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    fn apply_to(&self, input: &str) -> Option<String> {
        if !self.regex.is_match(input) {
            return None;
        }
        Some(if self.replace_all {
            self.regex.replace_all(input, self.replacement.as_str()).into_owned()
        } else {
            self.regex.replace(input, self.replacement.as_str()).into_owned()
        })
    }

    /// Returns `(outcome, matched)`; `matched` tells the caller whether to
    /// honour `terminate_chain` even when the rule's outcome is
    /// `Unchanged` (match, but replacement equals the input).
    fn apply(&self, input: &str) -> (RuleOutcome, bool) {
        if self.ignore {
            if self.regex.is_match(input) {
                return (RuleOutcome::Ignore, true);
            }
            return (RuleOutcome::Unchanged, false);
        }
        if self.each_segment {
            let mut matched_any = false;
            let segments: Vec<String> = input
                .split('/')
                .map(|seg| match self.apply_to(seg) {
                    Some(replaced) => {
                        matched_any = true;
                        replaced
                    }
                    None => seg.to_string(),
                })
                .collect();
            if !matched_any {
                return (RuleOutcome::Unchanged, false);
            }
            return (RuleOutcome::Changed(segments.join("/")), true);
        }
        match self.apply_to(input) {
            Some(replaced) if replaced == input => (RuleOutcome::Unchanged, true),
            Some(replaced) => (RuleOutcome::Changed(replaced), true),
            None => (RuleOutcome::Unchanged, false),
        }
    }
}

/// An ordered list of [`Rule`]s applied lowest-`order`-first, ties broken
/// by insertion order (stable sort), per SPEC_FULL.md §2.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: Rule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.order());
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Walk the rules in order, threading the (possibly rewritten) string
    /// through each match. Stops at the first `Ignore`, or after a rule
    /// whose `terminate_chain` flag is set and which matched.
    pub fn apply(&self, input: &str) -> RuleOutcome {
        let mut current = input.to_string();
        let mut changed = false;
        for rule in &self.rules {
            let (outcome, matched) = rule.apply(&current);
            match outcome {
                RuleOutcome::Ignore => return RuleOutcome::Ignore,
                RuleOutcome::Changed(new) => {
                    current = new;
                    changed = true;
                }
                RuleOutcome::Unchanged => {}
            }
            if matched && rule.terminate_chain {
                break;
            }
        }
        if changed {
            RuleOutcome::Changed(current)
        } else {
            RuleOutcome::Unchanged
        }
    }
}
