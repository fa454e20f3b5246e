//! Per-cycle sampling and aggregation
//!
//! A cycle takes `num_of_measurements` temperature samples followed by
//! `num_of_measurements` distance samples, pausing for the sensor's settle
//! delay between consecutive samples. Failed samples are discarded and
//! counted; a cycle always yields exactly one [`CycleRecord`].

use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::config::StationConfig;
use crate::convert::ThermistorCalibration;
use crate::record::{CycleRecord, Stats};
use crate::report::{Event, Reporter};
use crate::sensors::{PhysicalReading, SensorKind, SensorSampler};
use crate::time::{Clock, delay_for};

/// Drives the sampler through one measurement cycle at a time
pub struct CycleAggregator<'a, S, C> {
    config: &'a StationConfig,
    sampler: S,
    clock: C,
    calibration: ThermistorCalibration,
}

impl<'a, S, C> CycleAggregator<'a, S, C>
where
    S: SensorSampler,
    C: Clock,
{
    pub fn new(config: &'a StationConfig, sampler: S, clock: C) -> Self {
        Self::with_calibration(config, sampler, clock, ThermistorCalibration::default())
    }

    pub fn with_calibration(
        config: &'a StationConfig,
        sampler: S,
        clock: C,
        calibration: ThermistorCalibration,
    ) -> Self {
        Self {
            config,
            sampler,
            clock,
            calibration,
        }
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// Run one full cycle and return its record.
    pub fn run_cycle<D, R>(
        &mut self,
        cycle_index: u32,
        delay: &mut D,
        reporter: &mut R,
    ) -> CycleRecord
    where
        D: DelayNs,
        R: Reporter,
    {
        let temperature = self.measure(
            SensorKind::Temperature,
            self.config.sleep_between_temperature,
            None,
            delay,
            reporter,
        );

        let ambient = if self.config.compensate_speed_of_sound {
            temperature.valid_mean()
        } else {
            None
        };
        let distance = self.measure(
            SensorKind::Distance,
            self.config.sleep_between_distance,
            ambient,
            delay,
            reporter,
        );

        CycleRecord {
            cycle_index,
            timestamp: self.clock.now(),
            distance,
            temperature,
        }
    }

    /// Sample one sensor `num_of_measurements` times and summarise the results.
    fn measure<D, R>(
        &mut self,
        kind: SensorKind,
        settle: Duration,
        ambient_c: Option<f64>,
        delay: &mut D,
        reporter: &mut R,
    ) -> Stats
    where
        D: DelayNs,
        R: Reporter,
    {
        let count = self.config.num_of_measurements;
        let mut values = Vec::with_capacity(count as usize);
        let mut discarded = 0;

        for sample in 0..count {
            if sample > 0 {
                delay_for(delay, settle);
            }

            let reading = self
                .sampler
                .read_raw(kind)
                .and_then(|raw| PhysicalReading::from_raw(raw, &self.calibration, ambient_c));

            match reading {
                Ok(reading) => {
                    reporter.report(&Event::SampleTaken {
                        sample,
                        reading: &reading,
                    });
                    values.push(reading.value);
                }
                Err(error) => {
                    discarded += 1;
                    reporter.report(&Event::SampleDiscarded {
                        kind,
                        sample,
                        error: &error,
                    });
                }
            }
        }

        let stats = Stats::from_values(&values, discarded);
        debug!("({}) Cycle stats: {}", kind, stats);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::{EchoEdge, FakeSampler, SensorError};
    use crate::time::FixedClock;
    use chrono::TimeZone;
    use chrono::Utc;

    #[derive(Default)]
    struct RecordingDelay {
        calls: Vec<u32>,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.calls.push(ms);
        }
    }

    #[derive(Default)]
    struct CountingReporter {
        taken: usize,
        discarded: usize,
    }

    impl Reporter for CountingReporter {
        fn report(&mut self, event: &Event<'_>) {
            match event {
                Event::SampleTaken { .. } => self.taken += 1,
                Event::SampleDiscarded { .. } => self.discarded += 1,
                _ => {}
            }
        }
    }

    fn config(measurements: u32) -> StationConfig {
        StationConfig {
            num_of_measurements: measurements,
            sleep_between_temperature: Duration::from_secs(3),
            sleep_between_distance: Duration::from_secs(1),
            ..StationConfig::default()
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_all_samples_succeed() {
        let config = config(4);
        let mut aggregator = CycleAggregator::new(&config, FakeSampler::fixed(50.0, 22.0), clock());
        let mut delay = RecordingDelay::default();
        let mut reporter = CountingReporter::default();

        let record = aggregator.run_cycle(7, &mut delay, &mut reporter);

        assert_eq!(record.cycle_index, 7);
        assert_eq!(record.timestamp, clock().0);
        assert_eq!(record.distance.sample_count, 4);
        assert_eq!(record.temperature.sample_count, 4);
        assert!((record.distance.mean - 50.0).abs() < 1e-3);
        assert!((record.temperature.mean - 22.0).abs() < 0.01);
        assert_eq!(reporter.taken, 8);
        assert_eq!(reporter.discarded, 0);
    }

    #[test]
    fn test_settle_delay_only_between_samples() {
        let config = config(3);
        let mut aggregator = CycleAggregator::new(&config, FakeSampler::fixed(50.0, 22.0), clock());
        let mut delay = RecordingDelay::default();

        aggregator.run_cycle(0, &mut delay, &mut CountingReporter::default());

        // Temperature first (3 s pauses), then distance (1 s pauses)
        assert_eq!(delay.calls, [3000, 3000, 1000, 1000]);
        assert_eq!(aggregator.sampler().temperature_reads(), 3);
        assert_eq!(aggregator.sampler().distance_reads(), 3);
    }

    #[test]
    fn test_all_distance_samples_time_out() {
        let config = config(5);
        let timeout = SensorError::Timeout {
            edge: EchoEdge::Rising,
            timeout_us: 40_000,
        };
        let mut aggregator =
            CycleAggregator::new(&config, FakeSampler::failing_distance(timeout, 22.0), clock());
        let mut reporter = CountingReporter::default();

        let record = aggregator.run_cycle(0, &mut RecordingDelay::default(), &mut reporter);

        assert!(record.distance.min.is_nan());
        assert!(record.distance.max.is_nan());
        assert!(record.distance.mean.is_nan());
        assert_eq!(record.distance.sample_count, 0);
        assert_eq!(record.distance.discarded, 5);
        assert_eq!(record.temperature.sample_count, 5);
        assert_eq!(reporter.discarded, 5);
    }

    #[test]
    fn test_partial_failures_are_discarded() {
        let config = config(4);
        let pulse = |cm| Ok(crate::convert::pulse_for_distance(cm));
        let sampler = FakeSampler::new(
            vec![
                pulse(40.0),
                Err(SensorError::Pin),
                pulse(60.0),
                // Out of the rated envelope
                pulse(900.0),
            ],
            vec![0, ThermistorCalibration::default().adc_for_temperature(20.0)],
        );
        let mut aggregator = CycleAggregator::new(&config, sampler, clock());

        let record = aggregator.run_cycle(
            0,
            &mut RecordingDelay::default(),
            &mut CountingReporter::default(),
        );

        assert_eq!(record.distance.sample_count, 2);
        assert_eq!(record.distance.discarded, 2);
        assert!((record.distance.mean - 50.0).abs() < 1e-3);
        assert!((record.distance.min - 40.0).abs() < 1e-3);
        assert!((record.distance.max - 60.0).abs() < 1e-3);

        // Code 0 is a calibration fault, every other reading is 20 °C
        assert_eq!(record.temperature.sample_count, 2);
        assert_eq!(record.temperature.discarded, 2);
    }

    #[test]
    fn test_speed_of_sound_compensation_uses_cycle_temperature() {
        let plain = config(2);
        let compensated = StationConfig {
            compensate_speed_of_sound: true,
            ..config(2)
        };

        let mut reporter = CountingReporter::default();
        let nominal = CycleAggregator::new(&plain, FakeSampler::fixed(100.0, 35.0), clock())
            .run_cycle(0, &mut RecordingDelay::default(), &mut reporter);
        let adjusted = CycleAggregator::new(&compensated, FakeSampler::fixed(100.0, 35.0), clock())
            .run_cycle(0, &mut RecordingDelay::default(), &mut reporter);

        // Sound travels faster in warm air, so the same pulse means a longer distance
        assert!(adjusted.distance.mean > nominal.distance.mean + 1.0);
    }
}
