// ============================================================================
// scheduler.rs — Myxelia
// Fixed-step driver. Wall-clock time is accumulated per display callback and
// consumed in whole tick intervals, capped so a stall never triggers a
// catch-up stampede; the backlog beyond the cap is dropped outright.
// ============================================================================

use std::time::{Duration, Instant};

/// Most ticks a single callback may run.
pub const MAX_TICKS_PER_CALLBACK: u32 = 4;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Map the 0..=99 speed setting to a tick interval: `100 - speed`
/// milliseconds, floored at 1 ms.
pub fn speed_to_interval(speed: u32) -> Duration {
    Duration::from_millis(u64::from(100 - speed.min(99)))
}

pub struct FixedStep {
    interval: Duration,
    accumulator: Duration,
    last: Option<Instant>,
    running: bool,
}

impl FixedStep {
    pub fn new(interval: Duration) -> Self {
        FixedStep {
            interval: interval.max(MIN_INTERVAL),
            accumulator: Duration::ZERO,
            last: None,
            running: false,
        }
    }

    /// stopped -> running; resets the accumulator and the last timestamp so
    /// the first callback after a long pause does not burst.
    pub fn start(&mut self) {
        self.running = true;
        self.accumulator = Duration::ZERO;
        self.last = None;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Change the tick interval. Accumulated time carries over.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(MIN_INTERVAL);
    }

    /// Feed the scheduler the current time; returns how many ticks to run.
    pub fn update(&mut self, now: Instant) -> u32 {
        if !self.running {
            return 0;
        }
        let elapsed = match self.last {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last = Some(now);
        self.consume(elapsed)
    }

    /// Accumulate `elapsed` and drain whole intervals, capped at
    /// MAX_TICKS_PER_CALLBACK. Exposed separately so tests can feed
    /// synthetic durations.
    pub fn consume(&mut self, elapsed: Duration) -> u32 {
        if !self.running {
            return 0;
        }
        self.accumulator += elapsed;
        let queued = self.accumulator.as_nanos() / self.interval.as_nanos();
        if queued > u128::from(MAX_TICKS_PER_CALLBACK) {
            self.accumulator = Duration::ZERO;
            return MAX_TICKS_PER_CALLBACK;
        }
        let ticks = queued as u32;
        self.accumulator -= self.interval * ticks;
        ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(interval_ms: u64) -> FixedStep {
        let mut scheduler = FixedStep::new(Duration::from_millis(interval_ms));
        scheduler.start();
        scheduler
    }

    #[test]
    fn stopped_scheduler_never_ticks() {
        let mut scheduler = FixedStep::new(Duration::from_millis(20));
        assert_eq!(scheduler.consume(Duration::from_secs(1)), 0);
        scheduler.start();
        scheduler.stop();
        assert_eq!(scheduler.consume(Duration::from_secs(1)), 0);
    }

    #[test]
    fn sub_interval_elapsed_accumulates() {
        let mut scheduler = running(20);
        assert_eq!(scheduler.consume(Duration::from_millis(8)), 0);
        assert_eq!(scheduler.consume(Duration::from_millis(8)), 0);
        // 24 ms banked: one tick fires, 4 ms remain.
        assert_eq!(scheduler.consume(Duration::from_millis(8)), 1);
        assert_eq!(scheduler.consume(Duration::from_millis(16)), 1);
    }

    #[test]
    fn stall_is_capped_and_backlog_dropped() {
        let mut scheduler = running(20);
        // 10x interval stall: the cap allows 4 ticks, the rest is dropped.
        assert_eq!(scheduler.consume(Duration::from_millis(200)), 4);
        // No debt carried over: the next interval yields exactly one tick.
        assert_eq!(scheduler.consume(Duration::from_millis(20)), 1);
    }

    #[test]
    fn exact_cap_multiple_keeps_remainder() {
        let mut scheduler = running(20);
        assert_eq!(scheduler.consume(Duration::from_millis(85)), 4);
        // 5 ms remainder survived (4x20 consumed out of 85).
        assert_eq!(scheduler.consume(Duration::from_millis(15)), 1);
    }

    #[test]
    fn set_interval_keeps_accumulated_time() {
        let mut scheduler = running(20);
        assert_eq!(scheduler.consume(Duration::from_millis(18)), 0);
        scheduler.set_interval(Duration::from_millis(10));
        // The banked 18 ms now covers one 10 ms tick with 8 ms left.
        assert_eq!(scheduler.consume(Duration::ZERO), 1);
        assert_eq!(scheduler.consume(Duration::from_millis(2)), 1);
    }

    #[test]
    fn start_resets_accumulated_time() {
        let mut scheduler = running(20);
        assert_eq!(scheduler.consume(Duration::from_millis(19)), 0);
        scheduler.start();
        assert_eq!(scheduler.consume(Duration::from_millis(19)), 0);
    }

    #[test]
    fn update_measures_from_previous_callback() {
        let mut scheduler = running(10);
        let t0 = Instant::now();
        // First update only establishes the timestamp.
        assert_eq!(scheduler.update(t0), 0);
        assert_eq!(scheduler.update(t0 + Duration::from_millis(25)), 2);
        assert_eq!(scheduler.update(t0 + Duration::from_millis(30)), 1);
    }

    #[test]
    fn speed_maps_inversely_with_a_one_ms_floor() {
        assert_eq!(speed_to_interval(80), Duration::from_millis(20));
        assert_eq!(speed_to_interval(0), Duration::from_millis(100));
        assert_eq!(speed_to_interval(99), Duration::from_millis(1));
        assert_eq!(speed_to_interval(500), Duration::from_millis(1));
    }
}
