//! Datastore node termination (spec.md §4.6.1, component J).
//!
//! SQL parsing and stack-trace capture are the host's job (spec.md §1 lists
//! "SQL lexer" among the external collaborators this core only consumes a
//! contract from); [`DatastoreHost`] is that contract, with no-op defaults
//! so a caller only implements the hooks it actually has.

use apm_segment::{DatastoreAttributes, InstanceAttributes, Segment, SegmentArena, SegmentId, TypedAttributes};
use apm_metrics::SlowSqlStore;
use apm_strings::StringPool;
use apm_time::{Duration, Timestamp};

use crate::options::{RecordSqlMode, TxnOptions};
use crate::valid_node_end;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DatastoreVendor {
    Mysql,
    Postgres,
    Sqlite,
    Mssql,
    Oracle,
    Mongo,
    Redis,
    Memcached,
    Other,
}

impl DatastoreVendor {
    pub fn canonical_name(&self, caller_supplied: Option<&str>) -> Option<String> {
        let name = match self {
            DatastoreVendor::Mysql => "MySQL",
            DatastoreVendor::Postgres => "Postgres",
            DatastoreVendor::Sqlite => "SQLite",
            DatastoreVendor::Mssql => "MSSQL",
            DatastoreVendor::Oracle => "Oracle",
            DatastoreVendor::Mongo => "MongoDB",
            DatastoreVendor::Redis => "Redis",
            DatastoreVendor::Memcached => "Memcached",
            DatastoreVendor::Other => return caller_supplied.map(|s| s.to_string()),
        };
        Some(name.to_string())
    }

    /// Whether this vendor speaks SQL, gating the SQL-parse/obfuscate/
    /// slow-SQL-capture parts of termination (spec.md §4.6.1 steps 2, 11).
    pub fn is_sql(&self) -> bool {
        !matches!(self, DatastoreVendor::Mongo | DatastoreVendor::Redis | DatastoreVendor::Memcached)
    }
}

pub trait DatastoreHost {
    fn parse_sql_operation_table(&self, sql: &str) -> Option<(String, String)> {
        sql_parse(sql)
    }
    fn modify_table_name(&self, name: &str) -> String {
        name.to_string()
    }
    fn backtrace(&self) -> Option<String> {
        None
    }
    fn hostname(&self) -> String {
        "unknown".to_string()
    }
}

#[derive(Clone, Debug, Default)]
pub struct DatastoreInput {
    pub collection: Option<String>,
    pub operation: Option<String>,
    pub sql: Option<String>,
    pub sql_obfuscated: Option<String>,
    pub input_query_json: Option<String>,
    pub explain_plan_json: Option<String>,
    pub instance: Option<InstanceAttributes>,
    pub async_context: Option<apm_strings::StringId>,
}

/// Recovers `(operation, table)` from a raw SQL string when the host
/// doesn't supply one (spec.md §4.6.1 step 2). A small hand-rolled
/// tokenizer, not a real SQL parser: it only needs to find the verb and
/// the table name after `FROM`/`INTO`/`UPDATE`.
pub fn sql_parse(sql: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = sql.split_whitespace().collect();
    let operation = tokens.first()?.to_lowercase();
    if !matches!(operation.as_str(), "select" | "insert" | "update" | "delete") {
        return None;
    }

    let table = if operation == "update" {
        tokens.get(1).copied()
    } else {
        tokens
            .iter()
            .position(|t| t.eq_ignore_ascii_case("from") || t.eq_ignore_ascii_case("into"))
            .and_then(|i| tokens.get(i + 1).copied())
    }?;

    Some((operation, clean_identifier(table)))
}

fn clean_identifier(raw: &str) -> String {
    raw.trim_matches(|c: char| c == '`' || c == '"' || c == '\'' || c == ';' || c == '(' || c == ')').to_string()
}

/// Replaces string and numeric literals in `sql` with `?`, collapsing a
/// run of several literals (e.g. an `IN (1, 2, 3)` list) into a single
/// placeholder (spec.md §4.6.1 step 11, SPEC_FULL.md's RecordSqlMode
/// section). No external SQL parser: a left-to-right character scan.
pub fn obfuscate(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' {
            i = skip_quoted(&chars, i);
            out.push('?');
            i = skip_placeholder_run(&chars, i, &mut out);
        } else if c.is_ascii_digit() {
            i = skip_numeric(&chars, i);
            out.push('?');
            i = skip_placeholder_run(&chars, i, &mut out);
        } else {
            out.push(c);
            i += 1;
        }
    }
    out
}

fn skip_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() && chars[i] != quote {
        i += 1;
    }
    if i < chars.len() {
        i += 1;
    }
    i
}

fn skip_numeric(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    i
}

/// After emitting a single `?` for a literal, absorbs any further
/// separator-joined literals (`1, 2, 3` inside an `IN (...)` list) into
/// that same placeholder instead of emitting one `?` per value.
fn skip_placeholder_run(chars: &[char], mut i: usize, out: &mut String) -> usize {
    loop {
        let mut j = i;
        while j < chars.len() && matches!(chars[j], ' ' | ',' | '(' | ')') {
            j += 1;
        }
        if j >= chars.len() {
            return i;
        }
        match chars[j] {
            '\'' | '"' => {
                i = skip_quoted(chars, j);
            }
            c if c.is_ascii_digit() => {
                i = skip_numeric(chars, j);
            }
            _ => return i,
        }
    }
}

/// `false` on any early-drop path (invalid interval, unresolvable vendor
/// display string); `true` on a successfully terminated node.
#[allow(clippy::too_many_arguments)]
pub fn terminate_datastore(
    host: &dyn DatastoreHost,
    arena: &mut SegmentArena,
    strings: &mut StringPool,
    id: SegmentId,
    start: Timestamp,
    stop: Timestamp,
    vendor: DatastoreVendor,
    vendor_str: Option<&str>,
    mut input: DatastoreInput,
    datastore_products: &mut Vec<String>,
    scoped_metrics: &mut apm_metrics::MetricTable,
    unscoped_metrics: &mut apm_metrics::MetricTable,
    slowsqls: &mut SlowSqlStore,
    root_kids_duration: &mut Duration,
    options: &TxnOptions,
    txn_start: Timestamp,
    recording: bool,
) -> bool {
    if !valid_node_end(recording, txn_start, start, stop) {
        tracing::debug!(target: "apm_txn", "dropping datastore node: invalid interval");
        return false;
    }

    let resolved_obfuscated = input.sql_obfuscated.clone().or_else(|| input.sql.as_deref().map(obfuscate));

    if vendor.is_sql() {
        if let Some(sql) = &input.sql {
            if input.collection.is_none() || input.operation.is_none() {
                match host.parse_sql_operation_table(sql) {
                    Some((op, table)) => {
                        let table = host.modify_table_name(&table);
                        input.operation.get_or_insert(op);
                        input.collection.get_or_insert(table);
                    }
                    None => {
                        unscoped_metrics.add_timed(
                            apm_metrics::SupportabilityCounter::MalformedSql.metric_name(),
                            Duration::ZERO,
                            Duration::ZERO,
                            true,
                        );
                    }
                }
            }
        }
    }

    let Some(display_name) = vendor.canonical_name(vendor_str) else {
        tracing::debug!(target: "apm_txn", "dropping datastore node: no vendor display string");
        return false;
    };

    if !datastore_products.iter().any(|p| p == &display_name) {
        datastore_products.push(display_name.clone());
    }

    let operation = input.operation.clone().unwrap_or_else(|| "other".to_string());

    let duration = stop.delta(start);
    let exclusive = duration;
    *root_kids_duration = *root_kids_duration + duration;

    unscoped_metrics.add_timed("Datastore/all", duration, exclusive, true);
    unscoped_metrics.add_timed(&format!("Datastore/{display_name}/all"), duration, exclusive, true);

    let scoped_name = if let Some(collection) = &input.collection {
        unscoped_metrics.add_timed(
            &format!("Datastore/operation/{display_name}/{operation}"),
            duration,
            exclusive,
            false,
        );
        format!("Datastore/statement/{display_name}/{collection}/{operation}")
    } else {
        format!("Datastore/operation/{display_name}/{operation}")
    };
    scoped_metrics.add_timed(&scoped_name, duration, exclusive, false);

    if let Some(instance) = &input.instance {
        if options.instance_reporting_enabled {
            let host_str = match instance.host.as_deref() {
                None | Some("") => "unknown".to_string(),
                Some("localhost") => host.hostname(),
                Some(h) => h.to_string(),
            };
            let port = instance.port_path_or_id.clone().filter(|p| !p.is_empty()).unwrap_or_else(|| "unknown".to_string());
            unscoped_metrics.add_timed(
                &format!("Datastore/instance/{display_name}/{host_str}/{port}"),
                duration,
                exclusive,
                false,
            );
        }
    }

    let mut attrs = DatastoreAttributes {
        component: Some(display_name.clone()),
        instance: input.instance.clone(),
        ..Default::default()
    };
    if options.database_name_reporting_enabled {
        if let Some(instance) = &input.instance {
            attrs.instance.get_or_insert_with(Default::default).database_name = instance.database_name.clone();
        }
    }
    attrs.explain_plan_json = input.explain_plan_json.clone();
    if duration >= options.ss_threshold {
        attrs.backtrace_json = host.backtrace();
    }

    match options.tt_recordsql {
        RecordSqlMode::Raw => attrs.sql = input.sql.clone(),
        RecordSqlMode::Obfuscated => {
            attrs.sql_obfuscated = resolved_obfuscated.clone();
            attrs.input_query_json = input.input_query_json.clone();
        }
        RecordSqlMode::None => {}
    }

    {
        let segment: &mut Segment = arena.get_mut(id);
        segment.typed_attributes = TypedAttributes::Datastore(Box::new(attrs));
    }
    let name_id = strings.intern(&scoped_name);
    arena.set_name(id, name_id);
    if let Some(ctx) = input.async_context {
        arena.get_mut(id).async_context = ctx;
    }

    if vendor.is_sql()
        && duration >= options.ep_threshold
        && options.tt_slowsql
        && options.tt_recordsql != RecordSqlMode::None
    {
        if let Some(obfuscated) = &resolved_obfuscated {
            slowsqls.record(obfuscated, &scoped_name, duration, input.input_query_json.clone());
        }
    }

    true
}
