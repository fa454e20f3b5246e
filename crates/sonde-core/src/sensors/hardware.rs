//! Hardware-backed sampler: HC-SR04 style ultrasonic ranger on two GPIOs and
//! a thermistor divider on an ADC channel.

use std::time::Duration;

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use log::trace;

use super::{EchoEdge, SensorError, SensorSampler};
use crate::time::MonotonicClock;

/// Width of the trigger pulse
pub const TRIGGER_PULSE_US: u32 = 10;

/// Longest wait for each echo edge. The sensor reports "nothing in range"
/// with a ~38 ms pulse, so anything past this means no sensor is attached.
pub const ECHO_TIMEOUT_US: u64 = 40_000;

/// One analog input channel.
///
/// `embedded-hal` 1.0 has no ADC abstraction; implement this over the
/// platform HAL. Codes are scaled to 16 bits.
pub trait AdcChannel {
    fn read_code(&mut self) -> u16;
}

impl<F: FnMut() -> u16> AdcChannel for F {
    fn read_code(&mut self) -> u16 {
        self()
    }
}

/// The station's sensor pair on real pins.
///
/// Requires a trigger output and an echo input for the ranger, an ADC channel
/// for the thermistor, a clock that provides microseconds via
/// [`MonotonicClock`] and a blocking delay.
pub struct HardwareSampler<TRIG, ECHO, ADC, CLOCK, DELAY> {
    trigger: TRIG,
    echo: ECHO,
    adc: ADC,
    clock: CLOCK,
    delay: DELAY,
}

impl<TRIG, ECHO, ADC, CLOCK, DELAY> HardwareSampler<TRIG, ECHO, ADC, CLOCK, DELAY>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    ADC: AdcChannel,
    CLOCK: MonotonicClock,
    DELAY: DelayNs,
{
    pub fn new(trigger: TRIG, echo: ECHO, adc: ADC, clock: CLOCK, delay: DELAY) -> Self {
        Self {
            trigger,
            echo,
            adc,
            clock,
            delay,
        }
    }

    /// Give back the owned hardware handles
    pub fn release(self) -> (TRIG, ECHO, ADC, CLOCK, DELAY) {
        (self.trigger, self.echo, self.adc, self.clock, self.delay)
    }

    /// Busy-poll the echo line until it reaches `level`; returns the time it did.
    fn wait_for_echo(
        &mut self,
        high: bool,
        since: u64,
        edge: EchoEdge,
    ) -> Result<u64, SensorError> {
        loop {
            let level = self.echo.is_high().map_err(|_| SensorError::Pin)?;
            let now = self.clock.now_micros();
            if level == high {
                return Ok(now);
            }
            if now.saturating_sub(since) > ECHO_TIMEOUT_US {
                return Err(SensorError::Timeout {
                    edge,
                    timeout_us: ECHO_TIMEOUT_US,
                });
            }
        }
    }
}

impl<TRIG, ECHO, ADC, CLOCK, DELAY> SensorSampler for HardwareSampler<TRIG, ECHO, ADC, CLOCK, DELAY>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    ADC: AdcChannel,
    CLOCK: MonotonicClock,
    DELAY: DelayNs,
{
    fn read_distance_once(&mut self) -> Result<Duration, SensorError> {
        // A previous echo still in flight would be measured as ours
        if self.echo.is_high().map_err(|_| SensorError::Pin)? {
            return Err(SensorError::EchoAlreadyHigh);
        }

        self.trigger.set_high().map_err(|_| SensorError::Pin)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set_low().map_err(|_| SensorError::Pin)?;

        let triggered = self.clock.now_micros();
        let start = self.wait_for_echo(true, triggered, EchoEdge::Rising)?;
        let end = self.wait_for_echo(false, start, EchoEdge::Falling)?;

        let pulse = Duration::from_micros(end.saturating_sub(start));
        trace!("Echo pulse {} us", pulse.as_micros());
        Ok(pulse)
    }

    fn read_temperature_once(&mut self) -> u16 {
        self.adc.read_code()
    }
}
