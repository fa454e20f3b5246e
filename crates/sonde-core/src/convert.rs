//! Conversion of raw sensor readings into physical units
//!
//! - Distance: the echo pulse covers the way to the target and back, so
//!   `cm = t × c / 2`.
//! - Temperature: the ADC reads the voltage across a thermistor sitting on
//!   the low side of a divider with a fixed series resistor. The thermistor
//!   resistance is converted to a temperature with either the Steinhart–Hart
//!   equation or the simpler Beta model.

use std::time::Duration;

use crate::sensors::SensorError;

/// Nominal speed of sound in air at 20 °C, in cm/s
pub const SPEED_OF_SOUND_CM_PER_S: f64 = 34_300.0;

/// Closest distance the ultrasonic sensor is rated for, in cm
pub const MIN_DISTANCE_CM: f64 = 2.0;
/// Farthest distance the ultrasonic sensor is rated for, in cm
pub const MAX_DISTANCE_CM: f64 = 400.0;

/// Full-scale ADC code (readings are scaled to 16 bits)
pub const ADC_FULL_SCALE: u16 = u16::MAX;

const KELVIN_OFFSET: f64 = 273.15;

/// Speed of sound adjusted for air temperature, in cm/s
pub fn speed_of_sound_cm_per_s(temperature_c: f64) -> f64 {
    331.5 * (1.0 + temperature_c / KELVIN_OFFSET).sqrt() * 100.0
}

/// Distance in cm for an echo pulse, at the nominal speed of sound.
pub fn distance_from_pulse(pulse: Duration) -> Result<f64, SensorError> {
    distance_with_speed(pulse, SPEED_OF_SOUND_CM_PER_S)
}

/// Distance in cm for an echo pulse, with the speed of sound adjusted for
/// the given air temperature.
pub fn distance_from_pulse_at(pulse: Duration, temperature_c: f64) -> Result<f64, SensorError> {
    distance_with_speed(pulse, speed_of_sound_cm_per_s(temperature_c))
}

fn distance_with_speed(pulse: Duration, speed_cm_per_s: f64) -> Result<f64, SensorError> {
    let distance_cm = pulse.as_secs_f64() * speed_cm_per_s / 2.0;

    if !(MIN_DISTANCE_CM..=MAX_DISTANCE_CM).contains(&distance_cm) {
        return Err(SensorError::OutOfRange {
            distance_cm,
            min_cm: MIN_DISTANCE_CM,
            max_cm: MAX_DISTANCE_CM,
        });
    }

    Ok(distance_cm)
}

/// Echo pulse width a target at `distance_cm` produces at the nominal speed
/// of sound. Inverse of [`distance_from_pulse`], used by simulated sensors.
pub fn pulse_for_distance(distance_cm: f64) -> Duration {
    Duration::from_secs_f64((distance_cm.max(0.0) * 2.0) / SPEED_OF_SOUND_CM_PER_S)
}

/// Resistance-to-temperature relation of the thermistor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThermistorModel {
    /// `1/T = A + B·ln(R) + C·ln(R)³`
    SteinhartHart { a: f64, b: f64, c: f64 },
    /// `1/T = 1/T0 + ln(R/R0)/β`
    Beta {
        nominal_resistance_ohms: f64,
        nominal_temperature_c: f64,
        beta: f64,
    },
}

impl ThermistorModel {
    /// Coefficients of the 10 kΩ NTC fitted on the station
    pub const STATION_NTC: Self = Self::SteinhartHart {
        a: 0.001129148,
        b: 0.000234125,
        c: 0.0000000876741,
    };

    /// Typical 10 kΩ / 25 °C / β=3950 NTC datasheet values
    pub const NTC_10K_3950: Self = Self::Beta {
        nominal_resistance_ohms: 10_000.0,
        nominal_temperature_c: 25.0,
        beta: 3950.0,
    };

    /// Temperature in °C for a resistance in ohms
    pub fn celsius(&self, resistance_ohms: f64) -> f64 {
        let ln_r = resistance_ohms.ln();
        let kelvin = match *self {
            Self::SteinhartHart { a, b, c } => 1.0 / (a + b * ln_r + c * ln_r.powi(3)),
            Self::Beta {
                nominal_resistance_ohms,
                nominal_temperature_c,
                beta,
            } => {
                let t0 = nominal_temperature_c + KELVIN_OFFSET;
                1.0 / (1.0 / t0 + (resistance_ohms / nominal_resistance_ohms).ln() / beta)
            }
        };
        kelvin - KELVIN_OFFSET
    }

    /// Resistance in ohms at a temperature in °C
    pub fn resistance(&self, temperature_c: f64) -> f64 {
        let kelvin = temperature_c + KELVIN_OFFSET;
        match *self {
            Self::SteinhartHart { a, b, c } => {
                // Closed-form solution of the cubic in ln(R)
                let x = (a - 1.0 / kelvin) / c;
                let y = ((b / (3.0 * c)).powi(3) + x * x / 4.0).sqrt();
                ((y - x / 2.0).cbrt() - (y + x / 2.0).cbrt()).exp()
            }
            Self::Beta {
                nominal_resistance_ohms,
                nominal_temperature_c,
                beta,
            } => {
                let t0 = nominal_temperature_c + KELVIN_OFFSET;
                nominal_resistance_ohms * (beta * (1.0 / kelvin - 1.0 / t0)).exp()
            }
        }
    }
}

/// Fixed calibration constants of the temperature channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermistorCalibration {
    /// Divider supply and ADC reference voltage
    pub reference_voltage: f64,
    /// Fixed resistor on the high side of the divider
    pub series_resistance_ohms: f64,
    pub model: ThermistorModel,
}

impl Default for ThermistorCalibration {
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            series_resistance_ohms: 10_000.0,
            model: ThermistorModel::STATION_NTC,
        }
    }
}

impl ThermistorCalibration {
    /// Thermistor resistance derived from an ADC code
    pub fn resistance_from_adc(&self, code: u16) -> f64 {
        let v_out = f64::from(code) * self.reference_voltage / f64::from(ADC_FULL_SCALE);
        v_out * self.series_resistance_ohms / (self.reference_voltage - v_out)
    }

    /// Temperature in °C for an ADC code.
    ///
    /// Fails when the derived resistance is not a positive finite number,
    /// which only happens with a shorted/open divider or a stuck ADC.
    pub fn temperature_from_adc(&self, code: u16) -> Result<f64, SensorError> {
        let resistance_ohms = self.resistance_from_adc(code);
        if !resistance_ohms.is_finite() || resistance_ohms <= 0.0 {
            return Err(SensorError::Calibration { resistance_ohms });
        }

        let celsius = self.model.celsius(resistance_ohms);
        if !celsius.is_finite() {
            return Err(SensorError::Calibration { resistance_ohms });
        }
        Ok(celsius)
    }

    /// ADC code the divider produces at a given temperature. Inverse of
    /// [`Self::temperature_from_adc`], used by simulated sensors.
    pub fn adc_for_temperature(&self, temperature_c: f64) -> u16 {
        let resistance = self.model.resistance(temperature_c);
        let ratio = resistance / (resistance + self.series_resistance_ohms);
        (ratio * f64::from(ADC_FULL_SCALE))
            .round()
            .clamp(0.0, f64::from(ADC_FULL_SCALE)) as u16
    }
}

/// Temperature in °C for an ADC code, with the station's default calibration.
pub fn temperature_from_adc(code: u16) -> Result<f64, SensorError> {
    ThermistorCalibration::default().temperature_from_adc(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_cm_duration_5ms() {
        let distance = distance_from_pulse(Duration::from_millis(5)).unwrap();
        assert!((distance - 85.75).abs() < 1e-9);
    }

    #[test]
    fn test_distance_monotonic_within_range() {
        // 2 cm ≈ 117 us, 400 cm ≈ 23.3 ms
        let mut previous = f64::MIN;
        for micros in (120..23_300).step_by(37) {
            let distance = distance_from_pulse(Duration::from_micros(micros)).unwrap();
            assert!(distance > previous, "not increasing at {micros} us");
            previous = distance;
        }
    }

    #[test]
    fn test_distance_out_of_range() {
        assert!(matches!(
            distance_from_pulse(Duration::from_micros(50)),
            Err(SensorError::OutOfRange { .. })
        ));
        assert!(matches!(
            distance_from_pulse(Duration::from_millis(30)),
            Err(SensorError::OutOfRange { .. })
        ));
        assert!(matches!(
            distance_from_pulse(Duration::ZERO),
            Err(SensorError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_pulse_for_distance_inverse() {
        for cm in [2.5, 50.0, 123.4, 399.0] {
            let distance = distance_from_pulse(pulse_for_distance(cm)).unwrap();
            assert!((distance - cm).abs() < 1e-3);
        }
    }

    #[test]
    fn test_speed_of_sound_temperature_adjusted() {
        assert_eq!(speed_of_sound_cm_per_s(0.0).round(), 33_150.0);
        assert_eq!((speed_of_sound_cm_per_s(20.0) / 100.0).round(), 343.0);
        assert_eq!((speed_of_sound_cm_per_s(40.0) / 100.0).round(), 355.0);
    }

    #[test]
    fn test_compensated_distance_grows_with_temperature() {
        let pulse = Duration::from_millis(5);
        let cold = distance_from_pulse_at(pulse, -10.0).unwrap();
        let warm = distance_from_pulse_at(pulse, 30.0).unwrap();
        assert!(warm > cold);
    }

    #[test]
    fn test_temperature_finite_for_positive_resistance() {
        let calibration = ThermistorCalibration::default();
        for code in (1..ADC_FULL_SCALE).step_by(97) {
            let celsius = calibration.temperature_from_adc(code).unwrap();
            assert!(celsius.is_finite(), "code {code} gave {celsius}");
        }
    }

    #[test]
    fn test_temperature_calibration_error() {
        // 0 V across the thermistor: zero resistance
        assert!(matches!(
            temperature_from_adc(0),
            Err(SensorError::Calibration { .. })
        ));
        // Full scale: open circuit, division by zero
        assert!(matches!(
            temperature_from_adc(ADC_FULL_SCALE),
            Err(SensorError::Calibration { .. })
        ));
    }

    #[test]
    fn test_temperature_at_half_scale() {
        // Equal divider halves: R = 10 kΩ, which the station NTC maps to ~25 °C
        let celsius = temperature_from_adc(32_768).unwrap();
        assert!((celsius - 25.0).abs() < 0.1, "got {celsius}");
    }

    #[test]
    fn test_adc_for_temperature_inverse() {
        for model in [ThermistorModel::STATION_NTC, ThermistorModel::NTC_10K_3950] {
            let calibration = ThermistorCalibration {
                model,
                ..ThermistorCalibration::default()
            };
            for celsius in [-10.0, 0.0, 22.0, 35.5] {
                let code = calibration.adc_for_temperature(celsius);
                let back = calibration.temperature_from_adc(code).unwrap();
                assert!((back - celsius).abs() < 0.02, "{celsius} -> {code} -> {back}");
            }
        }
    }

    #[test]
    fn test_beta_model_nominal_point() {
        let model = ThermistorModel::NTC_10K_3950;
        assert!((model.celsius(10_000.0) - 25.0).abs() < 1e-9);
        assert!((model.resistance(25.0) - 10_000.0).abs() < 1e-6);
    }
}
