//! Deterministic sampler for tests and dry runs

use std::time::Duration;

use super::{SensorError, SensorSampler};
use crate::convert::{self, ThermistorCalibration};

/// Replays scripted raw readings, cycling through each script.
///
/// ```rust
/// use sonde_core::sensors::{FakeSampler, SensorSampler};
///
/// let mut sampler = FakeSampler::fixed(50.0, 22.0);
/// assert!(sampler.read_distance_once().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct FakeSampler {
    distance: Vec<Result<Duration, SensorError>>,
    temperature: Vec<u16>,
    distance_pos: usize,
    temperature_pos: usize,
    distance_reads: usize,
    temperature_reads: usize,
}

impl FakeSampler {
    /// Replay the given scripts. Empty scripts are replaced by a 100 cm / 20 °C reading.
    pub fn new(distance: Vec<Result<Duration, SensorError>>, temperature: Vec<u16>) -> Self {
        let distance = if distance.is_empty() {
            vec![Ok(convert::pulse_for_distance(100.0))]
        } else {
            distance
        };
        let temperature = if temperature.is_empty() {
            vec![ThermistorCalibration::default().adc_for_temperature(20.0)]
        } else {
            temperature
        };

        Self {
            distance,
            temperature,
            distance_pos: 0,
            temperature_pos: 0,
            distance_reads: 0,
            temperature_reads: 0,
        }
    }

    /// Always read the given distance and temperature (default calibration).
    pub fn fixed(distance_cm: f64, temperature_c: f64) -> Self {
        Self::new(
            vec![Ok(convert::pulse_for_distance(distance_cm))],
            vec![ThermistorCalibration::default().adc_for_temperature(temperature_c)],
        )
    }

    /// Every distance read fails with `error`.
    pub fn failing_distance(error: SensorError, temperature_c: f64) -> Self {
        Self::new(
            vec![Err(error)],
            vec![ThermistorCalibration::default().adc_for_temperature(temperature_c)],
        )
    }

    pub fn distance_reads(&self) -> usize {
        self.distance_reads
    }

    pub fn temperature_reads(&self) -> usize {
        self.temperature_reads
    }
}

impl SensorSampler for FakeSampler {
    fn read_distance_once(&mut self) -> Result<Duration, SensorError> {
        let reading = self.distance[self.distance_pos % self.distance.len()];
        self.distance_pos += 1;
        self.distance_reads += 1;
        reading
    }

    fn read_temperature_once(&mut self) -> u16 {
        let code = self.temperature[self.temperature_pos % self.temperature.len()];
        self.temperature_pos += 1;
        self.temperature_reads += 1;
        code
    }
}
