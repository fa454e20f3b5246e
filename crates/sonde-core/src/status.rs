//! Board status LED
//!
//! The LED is lit while a cycle is measuring and dark otherwise. A storage or
//! transfer failure is signalled by blinking it, after which it returns to
//! the state it was in.

use std::time::Duration;

use embedded_hal::{delay::DelayNs, digital::OutputPin};
use log::warn;

use crate::report::{Event, Reporter};
use crate::time::delay_for;

/// Level changes per failure signal (an even count restores the LED)
pub const ERROR_BLINK_TOGGLES: u32 = 22;

pub const ERROR_BLINK_INTERVAL: Duration = Duration::from_millis(500);

/// [`Reporter`] that drives a status LED.
///
/// Combine it with a console sink as a pair: `(LogReporter::new(level), led)`.
pub struct StatusLed<P, D> {
    pin: P,
    delay: D,
    toggles: u32,
    interval: Duration,
    lit: bool,
}

impl<P, D> StatusLed<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Takes over `pin` and switches the LED off.
    pub fn new(pin: P, delay: D) -> Self {
        let mut led = Self {
            pin,
            delay,
            toggles: ERROR_BLINK_TOGGLES,
            interval: ERROR_BLINK_INTERVAL,
            lit: true,
        };
        led.set(false);
        led
    }

    pub fn with_blink(mut self, toggles: u32, interval: Duration) -> Self {
        self.toggles = toggles;
        self.interval = interval;
        self
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    fn set(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => self.lit = on,
            Err(e) => warn!("(led) Cannot switch status LED: {:?}", e),
        }
    }

    fn blink(&mut self) {
        for _ in 0..self.toggles {
            self.set(!self.lit);
            delay_for(&mut self.delay, self.interval);
        }
    }
}

impl<P, D> Reporter for StatusLed<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    fn report(&mut self, event: &Event<'_>) {
        match event {
            Event::CycleStarted { .. } => self.set(true),
            Event::CycleCompleted { .. } => self.set(false),
            event if event.is_failure() => self.blink(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use embedded_hal::digital::{ErrorKind, ErrorType};

    use crate::aggregator::CycleAggregator;
    use crate::config::{Endpoint, StationConfig, StoreMode, TransferConfig};
    use crate::record::{CycleRecord, Stats};
    use crate::report::{LogReporter, ReportLevel};
    use crate::scheduler::{CycleScheduler, RunError};
    use crate::sensors::{EchoEdge, FakeSampler, SensorError, SensorKind};
    use crate::storage::{MeasurementStore, MemoryBackend, StorageError};
    use crate::time::FixedClock;
    use crate::upload::{TftpClient, TransferError};

    /// Records every level written to it
    #[derive(Default)]
    struct LedPinMock {
        levels: Vec<bool>,
    }

    impl ErrorType for LedPinMock {
        type Error = ErrorKind;
    }

    impl OutputPin for LedPinMock {
        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.levels.push(true);
            Ok(())
        }

        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.levels.push(false);
            Ok(())
        }
    }

    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    #[derive(Default)]
    struct DelayMock {
        ms: u64,
    }

    impl DelayNs for DelayMock {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.ms += u64::from(ms);
        }
    }

    fn led() -> StatusLed<LedPinMock, DelayMock> {
        StatusLed::new(LedPinMock::default(), DelayMock::default())
    }

    #[test]
    fn test_starts_dark() {
        let led = led();
        assert!(!led.is_lit());
        let (pin, _) = led.release();
        assert_eq!(pin.levels, [false]);
    }

    #[test]
    fn test_lit_while_cycle_runs() {
        let mut led = led();

        led.report(&Event::CycleStarted {
            cycle_index: 0,
            total: 3,
        });
        assert!(led.is_lit());

        let error = SensorError::Timeout {
            edge: EchoEdge::Rising,
            timeout_us: 40_000,
        };
        led.report(&Event::SampleDiscarded {
            kind: SensorKind::Distance,
            sample: 1,
            error: &error,
        });
        assert!(led.is_lit());

        let (pin, delay) = led.release();
        assert_eq!(pin.levels, [false, true]);
        assert_eq!(delay.ms, 0);
    }

    #[test]
    fn test_failure_blinks_and_restores() {
        let mut led = led();
        let error = StorageError::Write {
            name: "data.json".into(),
            source: std::io::Error::other("disk gone"),
        };

        led.report(&Event::StorageFailed {
            cycle_index: 0,
            error: &error,
        });

        assert!(!led.is_lit());
        let (pin, delay) = led.release();
        assert_eq!(pin.levels.len(), 1 + ERROR_BLINK_TOGGLES as usize);
        assert!(pin.levels.windows(2).all(|pair| pair[0] != pair[1]));
        assert_eq!(
            delay.ms,
            u64::from(ERROR_BLINK_TOGGLES) * ERROR_BLINK_INTERVAL.as_millis() as u64
        );
    }

    #[test]
    fn test_pin_errors_leave_state_unchanged() {
        let mut led =
            StatusLed::new(BrokenPin, DelayMock::default()).with_blink(4, Duration::ZERO);
        assert!(led.is_lit());

        led.report(&Event::CycleCompleted {
            record: &CycleRecord {
                cycle_index: 0,
                timestamp: DateTime::<Utc>::UNIX_EPOCH,
                distance: Stats::empty(0),
                temperature: Stats::empty(0),
            },
        });
        assert!(led.is_lit());
    }

    #[test]
    fn test_run_brackets_cycles_and_signals_upload_failure() {
        let config = StationConfig {
            num_of_cycles: 2,
            num_of_measurements: 2,
            sleep_between_cycles: Duration::ZERO,
            sleep_between_distance: Duration::ZERO,
            sleep_between_temperature: Duration::ZERO,
            transfer: TransferConfig {
                server: Endpoint::new("127.0.0.1", 0),
                ..Default::default()
            },
            ..StationConfig::default()
        };
        let clock = FixedClock(DateTime::<Utc>::UNIX_EPOCH);
        let mut pin = LedPinMock::default();
        let mut delay = DelayMock::default();

        let result = CycleScheduler::new(
            &config,
            CycleAggregator::new(&config, FakeSampler::fixed(50.0, 22.0), clock),
            MeasurementStore::open(MemoryBackend::new("data.json"), StoreMode::Fresh).unwrap(),
            TftpClient::from_config(&config.transfer),
            DelayMock::default(),
            (
                LogReporter::new(ReportLevel::Basic),
                StatusLed::new(&mut pin, &mut delay).with_blink(6, Duration::from_millis(10)),
            ),
        )
        .unwrap()
        .run();

        assert!(matches!(
            result,
            Err(RunError::Transfer(TransferError::Unreachable { .. }))
        ));
        assert_eq!(
            pin.levels,
            [
                false, // taken over
                true, false, // cycle 1
                true, false, // cycle 2
                true, false, true, false, true, false, // upload failure
            ]
        );
        assert_eq!(delay.ms, 60);
    }
}
