//! End-to-end scenarios threading a whole transaction through `Txn`,
//! exercising the pieces that only show up once lifecycle, termination,
//! and finalisation are wired together (spec.md §8's concrete scenarios).

use apm_metrics::Metric;
use apm_rules::{Rule, RuleSet, SegmentTermsTable};
use apm_time::Duration;
use apm_txn::{
    BeginInput, CatResponse, ConnectReply, CpuTime, DatastoreHost, DatastoreInput, DatastoreVendor, PathType, Txn,
    TxnOptions,
};

struct NoopHost;
impl DatastoreHost for NoopHost {}

struct FixedSqlHost;
impl DatastoreHost for FixedSqlHost {
    fn parse_sql_operation_table(&self, _sql: &str) -> Option<(String, String)> {
        Some(("select".to_string(), "users".to_string()))
    }
    fn backtrace(&self) -> Option<String> {
        Some(r#"["frame1","frame2"]"#.to_string())
    }
}

fn begin(options: TxnOptions) -> Txn {
    Txn::begin(
        BeginInput {
            options,
            connect_reply: ConnectReply::default(),
            url_rules: RuleSet::new(),
            txn_rules: RuleSet::new(),
            segment_terms: SegmentTermsTable::new(),
            distributed_tracing_sampled: false,
        },
        0,
    )
}

/// Scenario 1: a simple web transaction with no children.
#[test]
fn simple_web_transaction_emits_the_expected_metric_set() {
    let mut options = TxnOptions::default();
    options.apdex_t = Duration::from_millis(500);
    let mut txn = begin(options);
    txn.set_path(PathType::Uri, "/foo", false);

    let stop = txn.tick(100_000);
    let finalized = txn.end(stop, CpuTime::default());

    assert_eq!(finalized.name, "WebTransaction/Uri/foo");
    assert!(txn.unscoped_metrics.get("HttpDispatcher").is_some());
    assert!(txn.unscoped_metrics.get("WebTransaction").is_some());
    assert!(txn.unscoped_metrics.get("WebTransaction/Uri/foo").is_some());
    assert!(txn.unscoped_metrics.get("WebTransactionTotalTime").is_some());
    assert!(txn.unscoped_metrics.get("WebTransactionTotalTime/Uri/foo").is_some());

    match txn.unscoped_metrics.get("Apdex/Uri/foo").unwrap() {
        Metric::Apdex(d) => {
            assert_eq!(d.satisfying, 1);
            assert_eq!(d.tolerating, 0);
            assert_eq!(d.failing, 0);
        }
        _ => panic!("expected an apdex metric"),
    }
}

/// Scenario 2: a datastore segment whose SQL resolves to a known table,
/// above every threshold, producing a slow-SQL entry.
#[test]
fn datastore_segment_above_thresholds_records_slow_sql() {
    let mut options = TxnOptions::default();
    options.tt_recordsql = apm_txn::RecordSqlMode::Obfuscated;
    options.tt_slowsql = true;
    options.ep_threshold = Duration::from_millis(500);
    options.ss_threshold = Duration::from_millis(500);
    let mut txn = begin(options);
    txn.set_path(PathType::Uri, "/users", false);

    let start = txn.tick(1_000);
    let seg = txn.start_segment(start, None);
    let stop = txn.tick(4_001_000);
    txn.end_segment(seg, stop);

    let ok = txn.terminate_datastore_segment(
        &FixedSqlHost,
        seg,
        start,
        stop,
        DatastoreVendor::Mysql,
        None,
        DatastoreInput {
            sql: Some("SELECT * FROM users WHERE id=1".to_string()),
            sql_obfuscated: Some("SELECT * FROM users WHERE id=?".to_string()),
            ..Default::default()
        },
    );
    assert!(ok);

    assert!(txn.unscoped_metrics.get("Datastore/all").is_some());
    assert!(txn.unscoped_metrics.get("Datastore/MySQL/all").is_some());
    assert!(txn.unscoped_metrics.get("Datastore/operation/MySQL/select").is_some());
    assert!(txn.scoped_metrics.get("Datastore/statement/MySQL/users/select").is_some());

    assert_eq!(txn.slowsqls.len(), 1);
    let entry = txn.slowsqls.iter().next().unwrap();
    assert_eq!(entry.count, 1);
    assert_eq!(entry.min, Duration::from_secs_f64(4.0));
    assert_eq!(entry.max, Duration::from_secs_f64(4.0));
    assert_eq!(entry.total, Duration::from_secs_f64(4.0));
    assert_eq!(entry.sql_obfuscated, "SELECT * FROM users WHERE id=?");

    txn.end(txn.tick(4_002_000), CpuTime::default());
}

/// Scenario 3: an external call that decodes a CAT response header.
#[test]
fn external_call_with_cat_response_names_the_cross_app_metric() {
    let mut txn = begin(TxnOptions::default());
    txn.set_path(PathType::Uri, "/checkout", false);

    let start = txn.tick(1_000);
    let seg = txn.start_segment(start, None);
    let stop = txn.tick(4_001_000);
    txn.end_segment(seg, stop);

    let ok = txn.terminate_external_segment(
        seg,
        start,
        stop,
        "http://newrelic.com?secret=shh",
        false,
        Some(CatResponse {
            id: "12345#6789".to_string(),
            txnname: "my_txn".to_string(),
            guid: Some("0123456789ABCDEF".to_string()),
        }),
    );
    assert!(ok);

    assert!(txn.unscoped_metrics.get("External/all").is_some());
    assert!(txn.unscoped_metrics.get("External/newrelic.com/all").is_some());
    assert!(txn.unscoped_metrics.get("ExternalApp/newrelic.com/12345#6789/all").is_some());
    assert!(txn
        .scoped_metrics
        .get("ExternalTransaction/newrelic.com/12345#6789/my_txn")
        .is_some());

    txn.end(txn.tick(4_002_000), CpuTime::default());
}

/// Scenario 4: two adjacent external calls to the same host roll up into
/// one metric set instead of two.
#[test]
fn adjacent_external_calls_roll_up_into_one_metric() {
    let mut txn = begin(TxnOptions::default());
    txn.set_path(PathType::Uri, "/checkout", false);

    let first_start = txn.tick(1_000);
    let first_seg = txn.start_segment(first_start, None);
    let first_stop = txn.tick(2_000);
    txn.end_segment(first_seg, first_stop);
    txn.terminate_external_segment(first_seg, first_start, first_stop, "http://newrelic.com", false, None);

    let second_start = txn.tick(2_001);
    let second_seg = txn.start_segment(second_start, None);
    let second_stop = txn.tick(3_000);
    txn.end_segment(second_seg, second_stop);
    let ok = txn.terminate_external_segment(second_seg, second_start, second_stop, "http://newrelic.com", true, None);
    assert!(ok);

    // One accumulated unscoped/scoped metric set, not two.
    match txn.unscoped_metrics.get("External/all").unwrap() {
        Metric::Timed(d) => assert_eq!(d.count, 1),
        _ => panic!("expected a timed metric"),
    }
    match txn.scoped_metrics.get("External/newrelic.com/all").unwrap() {
        Metric::Timed(d) => assert_eq!(d.count, 1),
        _ => panic!("expected a timed metric"),
    }

    txn.end(txn.tick(4_000), CpuTime::default());
}

/// Scenario 5: a path matching an ignore rule produces an `end` with no
/// metrics at all, and `status.ignore` is observably set.
#[test]
fn ignore_rule_suppresses_all_finalisation_output() {
    let mut url_rules = RuleSet::new();
    url_rules.add(Rule::new(0, r"^/ignore_path\.php$", "", true, false, false, false).unwrap());

    let mut txn = Txn::begin(
        BeginInput {
            options: TxnOptions::default(),
            connect_reply: ConnectReply::default(),
            url_rules,
            txn_rules: RuleSet::new(),
            segment_terms: SegmentTermsTable::new(),
            distributed_tracing_sampled: false,
        },
        0,
    );
    txn.set_path(PathType::Uri, "/ignore_path.php", false);

    let stop = txn.tick(50_000);
    let finalized = txn.end(stop, CpuTime::default());

    assert!(txn.status.ignore);
    assert!(txn.unscoped_metrics.is_empty());
    assert!(finalized.trace_payload.is_none());
    assert!(finalized.span_events.is_empty());
}
