//! Synthetic sensor pair for running the station without hardware

use std::time::Duration;

use sonde_core::convert::{self, ThermistorCalibration};
use sonde_core::sensors::{ECHO_TIMEOUT_US, EchoEdge};
use sonde_core::{SensorError, SensorSampler};

/// Every this many distance reads, the echo never comes back.
const DROPOUT_EVERY: u32 = 17;

/// Generates readings that drift slowly over simulated time.
pub struct SimulatedSampler {
    /// Simulated seconds, advanced on every read
    elapsed_secs: f64,
    step_secs: f64,
    distance_reads: u32,
    calibration: ThermistorCalibration,
}

impl SimulatedSampler {
    pub fn new(step: Duration) -> Self {
        Self {
            elapsed_secs: 0.0,
            step_secs: step.as_secs_f64(),
            distance_reads: 0,
            calibration: ThermistorCalibration::default(),
        }
    }

    fn tick(&mut self) -> f64 {
        self.elapsed_secs += self.step_secs;
        self.elapsed_secs
    }

    /// Water level style distance: 120–180 cm with a ripple
    fn distance_cm(t: f64) -> f64 {
        150.0 + 25.0 * (t / 600.0).sin() + 1.5 * (t / 7.0).cos()
    }

    /// Air temperature: 17–23 °C
    fn temperature_c(t: f64) -> f64 {
        20.0 + 3.0 * (t / 900.0).sin()
    }
}

impl SensorSampler for SimulatedSampler {
    fn read_distance_once(&mut self) -> Result<Duration, SensorError> {
        let t = self.tick();
        self.distance_reads += 1;
        if self.distance_reads % DROPOUT_EVERY == 0 {
            return Err(SensorError::Timeout {
                edge: EchoEdge::Rising,
                timeout_us: ECHO_TIMEOUT_US,
            });
        }
        Ok(convert::pulse_for_distance(Self::distance_cm(t)))
    }

    fn read_temperature_once(&mut self) -> u16 {
        let t = self.tick();
        self.calibration
            .adc_for_temperature(Self::temperature_c(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readings_stay_in_range() {
        let mut sampler = SimulatedSampler::new(Duration::from_secs(1));
        let calibration = ThermistorCalibration::default();

        for _ in 0..200 {
            let celsius = calibration
                .temperature_from_adc(sampler.read_temperature_once())
                .unwrap();
            assert!((16.9..=23.1).contains(&celsius), "{celsius}");

            if let Ok(pulse) = sampler.read_distance_once() {
                let cm = convert::distance_from_pulse(pulse).unwrap();
                assert!((120.0..=180.0).contains(&cm), "{cm}");
            }
        }
    }

    #[test]
    fn test_periodic_dropout() {
        let mut sampler = SimulatedSampler::new(Duration::from_secs(1));
        let failures = (0..DROPOUT_EVERY * 3)
            .filter(|_| sampler.read_distance_once().is_err())
            .count();
        assert_eq!(failures, 3);
    }
}
