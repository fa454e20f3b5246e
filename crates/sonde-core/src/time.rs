//! Clocks and blocking delays
//!
//! The wall clock is assumed to be set (NTP sync happens before the core runs).

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use embedded_hal::delay::DelayNs;

/// Wall-clock time source used to timestamp records
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Monotonic microsecond counter used to time echo pulses
pub trait MonotonicClock {
    /// The time elapsed since some fixed start point, in microseconds
    fn now_micros(&self) -> u64;
}

/// System real-time clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Microseconds since construction, from `std::time::Instant`
#[derive(Debug, Clone, Copy)]
pub struct StdMonotonic {
    start: Instant,
}

impl StdMonotonic {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdMonotonic {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for StdMonotonic {
    fn now_micros(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

/// Blocking delay that puts the thread to sleep
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Block for `duration` on any `DelayNs`, which only takes `u32` arguments.
pub fn delay_for<D: DelayNs>(delay: &mut D, duration: Duration) {
    let mut millis = duration.as_millis();
    while millis > 0 {
        let chunk = millis.min(u128::from(u32::MAX));
        delay.delay_ms(chunk as u32);
        millis -= chunk;
    }

    let micros = duration.subsec_micros() % 1000;
    if micros > 0 {
        delay.delay_us(micros);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingDelay {
        total_ns: u128,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u128::from(ns);
        }
    }

    #[test]
    fn test_delay_for_splits_units() {
        let mut delay = RecordingDelay::default();
        delay_for(&mut delay, Duration::from_micros(2_500_250));
        assert_eq!(delay.total_ns, 2_500_250_000);
    }

    #[test]
    fn test_delay_for_zero_is_noop() {
        let mut delay = RecordingDelay::default();
        delay_for(&mut delay, Duration::ZERO);
        assert_eq!(delay.total_ns, 0);
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = StdMonotonic::new();
        let first = clock.now_micros();
        std::thread::sleep(Duration::from_millis(2));
        assert!(clock.now_micros() >= first + 2_000);
    }
}
