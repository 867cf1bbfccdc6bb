//! Demo host: drives a single web transaction through the facade end to
//! end (begin, a database segment, an external call, finalisation) so the
//! crate produces something runnable. A real host replaces `NoopHost` with
//! its own SQL-lexer/backtrace hooks and wires `Txn` into its own request
//! lifecycle instead of this hand-rolled loop.

use apm::{
    BeginInput, CatResponse, ConnectReply, CpuTime, DatastoreHost, DatastoreInput, DatastoreVendor, Duration,
    PathType, RuleSet, SegmentTermsTable, Txn, TxnOptions,
};

struct NoopHost;
impl DatastoreHost for NoopHost {}

fn main() {
    tracing_subscriber_init();

    let mut txn = Txn::begin(
        BeginInput {
            options: TxnOptions::default(),
            connect_reply: ConnectReply::default(),
            url_rules: RuleSet::new(),
            txn_rules: RuleSet::new(),
            segment_terms: SegmentTermsTable::new(),
            distributed_tracing_sampled: false,
        },
        0,
    );

    txn.set_path(PathType::Uri, "/orders/123", false);

    let db_start = txn.tick(5);
    let db_seg = txn.start_segment(db_start, None);
    let db_stop = txn.tick(40);
    txn.end_segment(db_seg, db_stop);
    txn.terminate_datastore_segment(
        &NoopHost,
        db_seg,
        db_start,
        db_stop,
        DatastoreVendor::Postgres,
        None,
        DatastoreInput {
            collection: Some("orders".to_string()),
            operation: Some("select".to_string()),
            ..Default::default()
        },
    );

    let ext_start = txn.tick(45);
    let ext_seg = txn.start_segment(ext_start, None);
    let ext_stop = txn.tick(90);
    txn.end_segment(ext_seg, ext_stop);
    txn.terminate_external_segment(
        ext_seg,
        ext_start,
        ext_stop,
        "https://payments.example.com/charge?amount=10",
        false,
        None::<CatResponse>,
    );

    let stop = txn.tick(100);
    let finalized = txn.end(
        stop,
        CpuTime {
            user: Duration::from_millis(12),
            sys: Duration::from_millis(3),
        },
    );

    println!("transaction: {}", finalized.name);
    println!("total time: {:?}", finalized.intrinsics.total_time);
    println!("span events captured: {}", finalized.span_events.len());
    println!("trace payload emitted: {}", finalized.trace_payload.is_some());
}

fn tracing_subscriber_init() {
    let _ = tracing_subscriber::fmt::try_init();
}
