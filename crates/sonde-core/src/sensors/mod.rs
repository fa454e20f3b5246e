mod fake;
mod hardware;

pub use fake::FakeSampler;
pub use hardware::{AdcChannel, ECHO_TIMEOUT_US, HardwareSampler, TRIGGER_PULSE_US};

use core::fmt::Display;
use std::time::Duration;

use thiserror::Error;

use crate::convert::{self, ThermistorCalibration};

/// Echo pulse edge the distance sensor was waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoEdge {
    Rising,
    Falling,
}

/// Per-sample sensor failures. These never abort a cycle: the sample is
/// discarded and counted.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum SensorError {
    #[error("no {edge:?} echo edge within {timeout_us} us")]
    Timeout { edge: EchoEdge, timeout_us: u64 },
    #[error("echo line already high before trigger")]
    EchoAlreadyHigh,
    #[error("GPIO error while driving the sensor")]
    Pin,
    #[error("distance {distance_cm:.1} cm outside the rated {min_cm}-{max_cm} cm envelope")]
    OutOfRange {
        distance_cm: f64,
        min_cm: f64,
        max_cm: f64,
    },
    #[error("thermistor resistance {resistance_ohms} ohm is not usable (wiring or ADC fault)")]
    Calibration { resistance_ohms: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Distance,
    Temperature,
}

impl SensorKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Distance => "dist",
            Self::Temperature => "temp",
        }
    }

    pub const fn unit(self) -> Unit {
        match self {
            Self::Distance => Unit::Centimeters,
            Self::Temperature => Unit::Celsius,
        }
    }
}

impl Display for SensorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Centimeters,
    Celsius,
}

impl Unit {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Centimeters => "cm",
            Self::Celsius => "°C",
        }
    }
}

/// A single unconverted reading, as produced by the sensor hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSample {
    /// Width of the echo pulse
    Distance(Duration),
    /// ADC code of the thermistor divider
    Temperature(u16),
}

impl RawSample {
    pub const fn kind(&self) -> SensorKind {
        match self {
            Self::Distance(_) => SensorKind::Distance,
            Self::Temperature(_) => SensorKind::Temperature,
        }
    }
}

/// A reading converted to physical units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalReading {
    pub kind: SensorKind,
    pub value: f64,
    pub unit: Unit,
}

impl PhysicalReading {
    pub const fn new(kind: SensorKind, value: f64) -> Self {
        Self {
            kind,
            value,
            unit: kind.unit(),
        }
    }

    /// Convert a raw sample.
    ///
    /// `ambient_c` is used to adjust the speed of sound for distance samples;
    /// `None` uses the nominal speed of sound.
    pub fn from_raw(
        raw: RawSample,
        calibration: &ThermistorCalibration,
        ambient_c: Option<f64>,
    ) -> Result<Self, SensorError> {
        let value = match raw {
            RawSample::Distance(pulse) => match ambient_c {
                Some(temperature) => convert::distance_from_pulse_at(pulse, temperature)?,
                None => convert::distance_from_pulse(pulse)?,
            },
            RawSample::Temperature(code) => calibration.temperature_from_adc(code)?,
        };
        Ok(Self::new(raw.kind(), value))
    }
}

impl Display for PhysicalReading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:.1} {}", self.value, self.unit.symbol())
    }
}

/// Source of raw sensor readings
///
/// Implementations own the sensor handles for the lifetime of the process.
/// Settle delays between samples are applied by the caller.
pub trait SensorSampler {
    /// Trigger one ultrasonic ping and measure the echo pulse width.
    ///
    /// Blocks for the pulse round trip, bounded by the echo timeout.
    fn read_distance_once(&mut self) -> Result<Duration, SensorError>;

    /// Perform one analog-to-digital conversion of the thermistor divider.
    fn read_temperature_once(&mut self) -> u16;

    /// Take one raw sample of the given sensor.
    fn read_raw(&mut self, kind: SensorKind) -> Result<RawSample, SensorError> {
        match kind {
            SensorKind::Distance => self.read_distance_once().map(RawSample::Distance),
            SensorKind::Temperature => Ok(RawSample::Temperature(self.read_temperature_once())),
        }
    }
}

impl<S: SensorSampler + ?Sized> SensorSampler for &mut S {
    fn read_distance_once(&mut self) -> Result<Duration, SensorError> {
        (**self).read_distance_once()
    }

    fn read_temperature_once(&mut self) -> u16 {
        (**self).read_temperature_once()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_distance() {
        let calibration = ThermistorCalibration::default();
        let pulse = convert::pulse_for_distance(100.0);
        let reading =
            PhysicalReading::from_raw(RawSample::Distance(pulse), &calibration, None).unwrap();

        assert_eq!(reading.kind, SensorKind::Distance);
        assert_eq!(reading.unit, Unit::Centimeters);
        assert!((reading.value - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_from_raw_temperature_calibration_fault() {
        let calibration = ThermistorCalibration::default();
        let result = PhysicalReading::from_raw(RawSample::Temperature(0), &calibration, None);
        assert!(matches!(result, Err(SensorError::Calibration { .. })));
    }

    #[test]
    fn test_reading_display() {
        let reading = PhysicalReading::new(SensorKind::Temperature, 21.96);
        assert_eq!(reading.to_string(), "22.0 °C");
    }
}
