mod naming;
mod rule;
mod segment_terms;

pub use naming::{run_naming_pipeline, NamingInput, NamingOutcome};
pub use rule::{Rule, RuleOutcome, RuleSet};
pub use segment_terms::{SegmentTermRule, SegmentTermsTable};
