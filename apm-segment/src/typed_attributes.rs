//! Tagged union for a segment's typed attributes (spec.md §3.2, component B,
//! §4.3). Changing a segment's `type` frees its prior typed attributes; in
//! Rust that's just replacing the enum, which drops the old variant's
//! owned strings for free.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Custom,
    Datastore,
    External,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstanceAttributes {
    pub host: Option<String>,
    pub port_path_or_id: Option<String>,
    pub database_name: Option<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DatastoreAttributes {
    pub component: Option<String>,
    pub sql: Option<String>,
    pub sql_obfuscated: Option<String>,
    pub input_query_json: Option<String>,
    pub backtrace_json: Option<String>,
    pub explain_plan_json: Option<String>,
    pub instance: Option<InstanceAttributes>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ExternalAttributes {
    pub transaction_guid: Option<String>,
    pub uri: Option<String>,
    pub library: Option<String>,
    pub procedure: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypedAttributes {
    Custom,
    Datastore(Box<DatastoreAttributes>),
    External(Box<ExternalAttributes>),
}

impl Default for TypedAttributes {
    fn default() -> Self {
        TypedAttributes::Custom
    }
}

impl TypedAttributes {
    pub fn kind(&self) -> SegmentKind {
        match self {
            TypedAttributes::Custom => SegmentKind::Custom,
            TypedAttributes::Datastore(_) => SegmentKind::Datastore,
            TypedAttributes::External(_) => SegmentKind::External,
        }
    }

    pub fn as_datastore(&self) -> Option<&DatastoreAttributes> {
        match self {
            TypedAttributes::Datastore(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_external(&self) -> Option<&ExternalAttributes> {
        match self {
            TypedAttributes::External(e) => Some(e),
            _ => None,
        }
    }
}

/// Turn an empty string into "unset", matching spec.md §4.3's "an 'unset'
/// string in the input record is stored as absent in the segment".
pub fn non_empty(s: Option<&str>) -> Option<String> {
    match s {
        Some(s) if !s.is_empty() => Some(s.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_becomes_unset() {
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("x")), Some("x".to_string()));
    }

    #[test]
    fn replacing_type_drops_old_attributes() {
        let mut t = TypedAttributes::Datastore(Box::new(DatastoreAttributes {
            sql: Some("SELECT 1".into()),
            ..Default::default()
        }));
        assert_eq!(t.kind(), SegmentKind::Datastore);
        t = TypedAttributes::Custom;
        assert_eq!(t.kind(), SegmentKind::Custom);
        assert!(t.as_datastore().is_none());
    }
}
