use apm_time::{Duration, Timestamp};

/// An auxiliary record accruing "off-wallclock" duration for a named async
/// scope (spec.md §3.3, component A). A segment tagged with an async
/// context still starts and stops synchronously on the owning execution
/// context; the context only changes how its duration is charged.
#[derive(Clone, Copy, Debug)]
pub struct AsyncContext {
    start: Timestamp,
    stop: Timestamp,
    cumulative_off_thread_duration: Duration,
}

impl AsyncContext {
    pub fn new(start: Timestamp, stop: Timestamp, cumulative_off_thread_duration: Duration) -> Self {
        AsyncContext {
            start,
            stop,
            cumulative_off_thread_duration,
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn stop(&self) -> Timestamp {
        self.stop
    }

    /// `max(0, cumulative - (stop - start))`, the amount of time this
    /// context spent off the main wallclock, summed by the transaction
    /// into `async_duration` (spec.md §3.3).
    pub fn extra_time(&self) -> Duration {
        let wallclock = self.stop.delta(self.start);
        (self.cumulative_off_thread_duration - wallclock).non_negative()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apm_time::Clock;

    fn ts(clock: &mut Clock, when: i64) -> Timestamp {
        clock.tick(when)
    }

    #[test]
    fn extra_time_is_non_negative_difference() {
        let mut clock = Clock::new();
        let start = ts(&mut clock, 0);
        let stop = ts(&mut clock, 1_000_000);
        let ctx = AsyncContext::new(start, stop, Duration::from_secs_f64(3.0));
        assert_eq!(ctx.extra_time(), Duration::from_secs_f64(2.0));
    }

    #[test]
    fn extra_time_floors_at_zero() {
        let mut clock = Clock::new();
        let start = ts(&mut clock, 0);
        let stop = ts(&mut clock, 5_000_000);
        let ctx = AsyncContext::new(start, stop, Duration::from_secs_f64(1.0));
        assert_eq!(ctx.extra_time(), Duration::ZERO);
    }
}
