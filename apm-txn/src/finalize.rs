//! Transaction finalisation (spec.md §4.7, component M): duration/apdex/
//! error metrics, queue time, datastore/external rollups, distributed-trace
//! rollups, and the intrinsics a transaction event carries.

use std::collections::HashMap;

use apm_metrics::{ApdexZone, MetricTable};
use apm_time::{Duration, Timestamp};

use crate::dt::DtState;
use crate::options::TxnOptions;

#[derive(Clone, Copy, Debug, Default)]
pub struct CpuTime {
    pub user: Duration,
    pub sys: Duration,
}

impl CpuTime {
    pub fn total(&self) -> Duration {
        self.user + self.sys
    }
}

#[derive(Clone, Debug, Default)]
pub struct Intrinsics {
    pub total_time: Duration,
    pub cpu_time: Duration,
    pub cpu_user_time: Duration,
    pub cpu_sys_time: Duration,
    pub queue_time: Option<Duration>,
}

fn apdex_zone(duration: Duration, apdex_t: Duration, had_error: bool) -> ApdexZone {
    if had_error {
        return ApdexZone::Failing;
    }
    let tolerating_t = Duration::from_micros(apdex_t.as_micros() * 4);
    if duration <= apdex_t {
        ApdexZone::Satisfying
    } else if duration <= tolerating_t {
        ApdexZone::Tolerating
    } else {
        ApdexZone::Failing
    }
}

/// Everything finalisation needs pulled out of `Txn`'s fields so this stays
/// a free function operating on borrowed data, not a method tangled into
/// the transaction's own lifecycle.
#[allow(clippy::too_many_arguments)]
pub fn finalize(
    unscoped_metrics: &mut MetricTable,
    name: &str,
    background: bool,
    duration: Duration,
    root_kids_duration: Duration,
    total_time: Duration,
    apdex_t: Option<Duration>,
    ignore_apdex: bool,
    had_error: bool,
    queue_start: Option<Timestamp>,
    txn_start: Timestamp,
    cpu: CpuTime,
    datastore_products: &[String],
    datastore_duration_by_vendor: &HashMap<String, Duration>,
    external_duration_by_host: &HashMap<String, Duration>,
    dt: &DtState,
    options: &TxnOptions,
) -> Intrinsics {
    let kind = if background { "Other" } else { "Web" };
    let all_metric = if background { "OtherTransaction/all".to_string() } else { "WebTransaction".to_string() };
    let exclusive = (duration - root_kids_duration).non_negative();

    unscoped_metrics.add_timed(&all_metric, duration, exclusive, true);
    unscoped_metrics.add_timed(name, duration, exclusive, true);
    unscoped_metrics.add_timed(&format!("{kind}TransactionTotalTime"), total_time, total_time, true);
    unscoped_metrics.add_timed(
        &format!("{kind}TransactionTotalTime/{}", strip_prefix(name)),
        total_time,
        total_time,
        false,
    );

    if !background {
        unscoped_metrics.add_timed("HttpDispatcher", duration, exclusive, true);
    }

    if let Some(apdex_t) = apdex_t {
        if !ignore_apdex {
            let zone = apdex_zone(duration, apdex_t, had_error);
            unscoped_metrics.add_apdex("Apdex", zone, apdex_t, true);
            unscoped_metrics.add_apdex(&format!("Apdex/{}", strip_prefix(name)), zone, apdex_t, false);
        }
    }

    if had_error {
        unscoped_metrics.add_timed("Errors/all", Duration::ZERO, Duration::ZERO, true);
        unscoped_metrics.add_timed(&format!("Errors/all{kind}"), Duration::ZERO, Duration::ZERO, true);
        unscoped_metrics.add_timed(&format!("Errors/{name}"), Duration::ZERO, Duration::ZERO, false);
    }

    let queue_time = queue_start.map(|qs| txn_start.delta(qs).non_negative());
    if let Some(queue_time) = queue_time {
        if queue_time > Duration::ZERO {
            unscoped_metrics.add_timed("WebFrontend/QueueTime", queue_time, queue_time, true);
        }
    }

    if !datastore_products.is_empty() {
        let all_duration: Duration = datastore_duration_by_vendor.values().copied().sum();
        unscoped_metrics.add_timed(&format!("Datastore/all{kind}"), all_duration, all_duration, true);
        for product in datastore_products {
            if let Some(d) = datastore_duration_by_vendor.get(product) {
                unscoped_metrics.add_timed(&format!("Datastore/{product}/all{kind}"), *d, *d, true);
            }
        }
    }

    if !external_duration_by_host.is_empty() {
        let all_duration: Duration = external_duration_by_host.values().copied().sum();
        unscoped_metrics.add_timed(&format!("External/all{kind}"), all_duration, all_duration, true);
        for (host, d) in external_duration_by_host {
            unscoped_metrics.add_timed(&format!("External/{host}/all{kind}"), *d, *d, false);
        }
    }

    if dt.enabled && options.distributed_tracing_enabled {
        let caller_type = dt.caller_type();
        let caller_account = dt.caller_account();
        let caller_app = dt.caller_app();
        let caller_transport = dt.caller_transport();
        let prefix = format!("{caller_type}/{caller_account}/{caller_app}/{caller_transport}");

        unscoped_metrics.add_timed(&format!("DurationByCaller/{prefix}/all"), duration, duration, true);
        unscoped_metrics.add_timed(&format!("DurationByCaller/{prefix}/all{kind}"), duration, duration, true);
        if had_error {
            unscoped_metrics.add_timed(&format!("ErrorsByCaller/{prefix}/all"), Duration::ZERO, Duration::ZERO, true);
            unscoped_metrics.add_timed(
                &format!("ErrorsByCaller/{prefix}/all{kind}"),
                Duration::ZERO,
                Duration::ZERO,
                true,
            );
        }
        if let Some(inbound) = &dt.inbound {
            if let Some(sent_at) = inbound.timestamp_when {
                let transport_duration = Duration::from_micros(txn_start.when() - sent_at).non_negative();
                unscoped_metrics.add_timed(
                    &format!("TransportDuration/{prefix}/all"),
                    transport_duration,
                    transport_duration,
                    true,
                );
                unscoped_metrics.add_timed(
                    &format!("TransportDuration/{prefix}/all{kind}"),
                    transport_duration,
                    transport_duration,
                    true,
                );
            }
        }
    }

    Intrinsics {
        total_time,
        cpu_time: cpu.total(),
        cpu_user_time: cpu.user,
        cpu_sys_time: cpu.sys,
        queue_time,
    }
}

fn strip_prefix(name: &str) -> &str {
    name.splitn(2, '/').nth(1).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_time::Clock;

    fn table() -> MetricTable {
        MetricTable::new(100)
    }

    #[test]
    fn web_transaction_records_all_and_named_metric() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        finalize(
            &mut metrics,
            "WebTransaction/Uri/checkout",
            false,
            Duration::from_millis(500),
            Duration::ZERO,
            Duration::from_millis(500),
            Some(Duration::from_millis(1000)),
            false,
            false,
            None,
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        assert!(metrics.get("WebTransaction").is_some());
        assert!(metrics.get("WebTransaction/Uri/checkout").is_some());
        assert!(metrics.get("HttpDispatcher").is_some());
    }

    #[test]
    fn error_forces_failing_apdex_and_error_metrics() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        finalize(
            &mut metrics,
            "WebTransaction/Uri/checkout",
            false,
            Duration::from_millis(100),
            Duration::ZERO,
            Duration::from_millis(100),
            Some(Duration::from_millis(1000)),
            false,
            true,
            None,
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        match metrics.get("Apdex").unwrap() {
            apm_metrics::Metric::Apdex(d) => {
                assert_eq!(d.failing, 1);
                assert_eq!(d.satisfying, 0);
            }
            _ => panic!("expected apdex metric"),
        }
        assert!(metrics.get("Errors/all").is_some());
        assert!(metrics.get("Errors/allWeb").is_some());
    }

    #[test]
    fn queue_time_uses_delta_from_queue_start() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let queue_start = clock.tick(0);
        let txn_start = clock.tick(250_000);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        let intrinsics = finalize(
            &mut metrics,
            "WebTransaction/Uri/checkout",
            false,
            Duration::from_millis(10),
            Duration::ZERO,
            Duration::from_millis(10),
            None,
            false,
            false,
            Some(queue_start),
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        assert_eq!(intrinsics.queue_time, Some(Duration::from_millis(250)));
        assert!(metrics.get("WebFrontend/QueueTime").is_some());
    }

    #[test]
    fn zero_queue_time_is_not_recorded() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let queue_start = clock.tick(0);
        let txn_start = clock.tick(0);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        let intrinsics = finalize(
            &mut metrics,
            "WebTransaction/Uri/checkout",
            false,
            Duration::from_millis(10),
            Duration::ZERO,
            Duration::from_millis(10),
            None,
            false,
            false,
            Some(queue_start),
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        assert_eq!(intrinsics.queue_time, Some(Duration::ZERO));
        assert!(metrics.get("WebFrontend/QueueTime").is_none());
    }

    #[test]
    fn exclusive_duration_subtracts_root_kids() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        finalize(
            &mut metrics,
            "WebTransaction/Uri/checkout",
            false,
            Duration::from_millis(500),
            Duration::from_millis(300),
            Duration::from_millis(500),
            None,
            false,
            false,
            None,
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        match metrics.get("WebTransaction").unwrap() {
            apm_metrics::Metric::Timed(d) => {
                assert_eq!(d.total, Duration::from_millis(500));
                assert_eq!(d.exclusive, Duration::from_millis(200));
            }
            _ => panic!("expected a timed metric"),
        }
    }

    #[test]
    fn background_transaction_uses_other_prefix() {
        let mut metrics = table();
        let mut clock = Clock::new();
        let txn_start = clock.tick(0);
        let options = TxnOptions::default();
        let dt = DtState::seed(false, &Default::default(), false);

        finalize(
            &mut metrics,
            "OtherTransaction/php/job",
            true,
            Duration::from_millis(50),
            Duration::ZERO,
            Duration::from_millis(50),
            None,
            false,
            false,
            None,
            txn_start,
            CpuTime::default(),
            &[],
            &HashMap::new(),
            &HashMap::new(),
            &dt,
            &options,
        );
        assert!(metrics.get("OtherTransaction/all").is_some());
        assert!(metrics.get("HttpDispatcher").is_none());
    }
}
