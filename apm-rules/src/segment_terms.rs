//! Segment-term whitelisting (spec.md §4.5 step 6): for a configured URL
//! prefix, any `/`-separated segment of the remaining path that is not in
//! the whitelist is collapsed to `*`, and runs of consecutive `*` collapse
//! to one.

use std::collections::HashSet;

#[derive(Debug)]
pub struct SegmentTermRule {
    prefix: String,
    whitelist: HashSet<String>,
}

impl SegmentTermRule {
    pub fn new(prefix: impl Into<String>, whitelist: impl IntoIterator<Item = String>) -> Self {
        SegmentTermRule {
            prefix: prefix.into(),
            whitelist: whitelist.into_iter().collect(),
        }
    }

    fn matches_prefix(&self, name: &str) -> bool {
        name == self.prefix.trim_end_matches('/') || name.starts_with(&self.prefix)
    }
}

/// The full table of [`SegmentTermRule`]s a connected agent was given by
/// its collector. Unlike [`crate::RuleSet`], at most one rule applies per
/// name: the one whose prefix matches.
#[derive(Debug, Default)]
pub struct SegmentTermsTable {
    rules: Vec<SegmentTermRule>,
}

impl SegmentTermsTable {
    pub fn new() -> Self {
        SegmentTermsTable { rules: Vec::new() }
    }

    pub fn add(&mut self, rule: SegmentTermRule) {
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, name: &str) -> String {
        let Some(rule) = self.rules.iter().find(|r| r.matches_prefix(name)) else {
            return name.to_string();
        };
        let prefix = rule.prefix.trim_end_matches('/');
        let Some(rest) = name.strip_prefix(prefix) else {
            return name.to_string();
        };
        let collapsed: Vec<&str> = rest
            .split('/')
            .map(|seg| {
                if seg.is_empty() || rule.whitelist.contains(seg) {
                    seg
                } else {
                    "*"
                }
            })
            .collect();
        let mut rebuilt = String::new();
        rebuilt.push_str(prefix);
        let mut last_was_star = false;
        for seg in collapsed {
            if seg == "*" {
                if last_was_star {
                    continue;
                }
                last_was_star = true;
            } else {
                last_was_star = false;
            }
            rebuilt.push('/');
            rebuilt.push_str(seg);
        }
        rebuilt
    }
}
