//! Internal `Supportability/...` counters (SPEC_FULL.md §2), incremented on
//! drop paths the original agent tracks beyond the one spec.md names
//! explicitly.

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SupportabilityCounter {
    BackgroundStatusChangePrevented,
    MalformedSql,
    OversizedUrl,
    RuleEngineError,
}

impl SupportabilityCounter {
    pub fn metric_name(&self) -> &'static str {
        match self {
            SupportabilityCounter::BackgroundStatusChangePrevented => {
                "Supportability/background_status_change_prevented"
            }
            SupportabilityCounter::MalformedSql => "Supportability/MalformedSql",
            SupportabilityCounter::OversizedUrl => "Supportability/OversizedUrl",
            SupportabilityCounter::RuleEngineError => "Supportability/RuleEngineError",
        }
    }
}
