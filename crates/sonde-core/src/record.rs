//! Per-cycle measurement records

use core::fmt::Display;

use chrono::{DateTime, Utc};

/// Summary of one sensor's readings over a cycle
///
/// When no sample survived, every value is NaN and `sample_count` is 0.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Number of readings the values were computed from
    pub sample_count: u32,
    /// Number of samples dropped because of sensor errors
    pub discarded: u32,
}

impl Stats {
    /// Sentinel for a cycle where every sample of the sensor failed
    pub const fn empty(discarded: u32) -> Self {
        Self {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            median: f64::NAN,
            sample_count: 0,
            discarded,
        }
    }

    /// Compute statistics over the surviving readings of a cycle.
    pub fn from_values(values: &[f64], discarded: u32) -> Self {
        if values.is_empty() {
            return Self::empty(discarded);
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in values {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        };

        Self {
            min,
            max,
            mean: sum / values.len() as f64,
            median,
            sample_count: values.len() as u32,
            discarded,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Mean value, if any sample survived
    pub fn valid_mean(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.mean)
    }
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Two empty sentinels compare equal even though NaN != NaN.
impl PartialEq for Stats {
    fn eq(&self, other: &Self) -> bool {
        same_value(self.min, other.min)
            && same_value(self.max, other.max)
            && same_value(self.mean, other.mean)
            && same_value(self.median, other.median)
            && self.sample_count == other.sample_count
            && self.discarded == other.discarded
    }
}

impl Display for Stats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return write!(f, "no valid samples ({} discarded)", self.discarded);
        }
        write!(
            f,
            "min {:.1}, max {:.1}, mean {:.1}, median {:.1} ({} samples, {} discarded)",
            self.min, self.max, self.mean, self.median, self.sample_count, self.discarded
        )
    }
}

/// One completed measurement cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleRecord {
    /// Zero-based position of the cycle within its run
    pub cycle_index: u32,
    /// Wall-clock time at cycle completion
    pub timestamp: DateTime<Utc>,
    /// Distance statistics in cm
    pub distance: Stats,
    /// Temperature statistics in °C
    pub temperature: Stats,
}

impl Display for CycleRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "[CycleRecord] cycle: {}, timestamp: {}, distance: {}, temperature: {}",
            self.cycle_index,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.distance,
            self.temperature
        )
    }
}
