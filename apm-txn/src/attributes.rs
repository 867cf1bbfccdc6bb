//! Destination-tagged attribute buckets (spec.md §3.1 `attributes`):
//! agent-supplied and user-supplied values are kept separate per
//! destination so each payload (trace, event, error, browser injection)
//! only ever sees what it's allowed to.

use std::collections::HashMap;

use apm_base::AttributeValue;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AttributeDestination {
    TraceOnly,
    EventOnly,
    ErrorOnly,
    Browser,
}

const ALL_DESTINATIONS: [AttributeDestination; 4] = [
    AttributeDestination::TraceOnly,
    AttributeDestination::EventOnly,
    AttributeDestination::ErrorOnly,
    AttributeDestination::Browser,
];

#[derive(Clone, Debug, Default)]
struct Bucket {
    agent: HashMap<String, AttributeValue>,
    user: HashMap<String, AttributeValue>,
}

#[derive(Clone, Debug, Default)]
pub struct AttributeStore {
    buckets: HashMap<AttributeDestination, Bucket>,
}

impl AttributeStore {
    pub fn new() -> Self {
        AttributeStore::default()
    }

    fn bucket_mut(&mut self, dest: AttributeDestination) -> &mut Bucket {
        self.buckets.entry(dest).or_default()
    }

    pub fn set_agent(&mut self, dest: AttributeDestination, key: &str, value: AttributeValue) {
        self.bucket_mut(dest).agent.insert(key.to_string(), value);
    }

    /// User attributes honour `custom_parameters_enabled`/`request_params_enabled`
    /// at the call site; this layer just stores whatever it's handed.
    pub fn set_user(&mut self, dest: AttributeDestination, key: &str, value: AttributeValue) {
        self.bucket_mut(dest).user.insert(key.to_string(), value);
    }

    /// A destination's combined (agent ∪ user, user wins on conflict) map,
    /// the shape `attrs_to_json` callers (spec.md §6.2's `agentAttributes`/
    /// `userAttributes`) expect.
    pub fn agent_for(&self, dest: AttributeDestination) -> HashMap<String, AttributeValue> {
        self.buckets.get(&dest).map(|b| b.agent.clone()).unwrap_or_default()
    }

    pub fn user_for(&self, dest: AttributeDestination) -> HashMap<String, AttributeValue> {
        self.buckets.get(&dest).map(|b| b.user.clone()).unwrap_or_default()
    }

    pub fn destinations() -> [AttributeDestination; 4] {
        ALL_DESTINATIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations_are_isolated() {
        let mut store = AttributeStore::new();
        store.set_agent(AttributeDestination::TraceOnly, "host", "db1".into());
        store.set_agent(AttributeDestination::EventOnly, "host", "db2".into());
        assert_eq!(
            store.agent_for(AttributeDestination::TraceOnly).get("host"),
            Some(&AttributeValue::from("db1"))
        );
        assert_eq!(
            store.agent_for(AttributeDestination::EventOnly).get("host"),
            Some(&AttributeValue::from("db2"))
        );
    }

    #[test]
    fn agent_and_user_values_kept_separate() {
        let mut store = AttributeStore::new();
        store.set_agent(AttributeDestination::ErrorOnly, "k", "agent".into());
        store.set_user(AttributeDestination::ErrorOnly, "k", "user".into());
        assert_eq!(
            store.agent_for(AttributeDestination::ErrorOnly).get("k"),
            Some(&AttributeValue::from("agent"))
        );
        assert_eq!(
            store.user_for(AttributeDestination::ErrorOnly).get("k"),
            Some(&AttributeValue::from("user"))
        );
    }
}
