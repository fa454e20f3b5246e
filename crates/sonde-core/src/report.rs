//! Console reporting
//!
//! The core decides *what* is worth reporting by emitting [`Event`]s into a
//! [`Reporter`]. How (and whether) they are rendered is up to the sink; the
//! provided [`LogReporter`] forwards them to the `log` facade, filtered by a
//! [`ReportLevel`].

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Endpoint;
use crate::record::CycleRecord;
use crate::scheduler::SchedulerState;
use crate::sensors::{PhysicalReading, SensorError, SensorKind};
use crate::storage::StorageError;
use crate::upload::{TransferError, UploadOutcome};

/// Verbosity of the console output
///
/// Levels are mutually exclusive and ordered: `Silent < Basic < Verbose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    /// Nothing is reported
    Silent,
    /// Cycle and upload milestones, and every failure
    #[default]
    Basic,
    /// Everything, including per-sample detail
    Verbose,
}

impl ReportLevel {
    /// Whether an event of level `event` passes this filter
    pub fn allows(self, event: ReportLevel) -> bool {
        self != ReportLevel::Silent && event <= self
    }
}

/// Something the core wants the operator to know about
#[derive(Debug)]
pub enum Event<'a> {
    RunStarted {
        cycles: u32,
        restored_records: usize,
    },
    StateChanged {
        state: SchedulerState,
    },
    CycleStarted {
        cycle_index: u32,
        total: u32,
    },
    SampleTaken {
        sample: u32,
        reading: &'a PhysicalReading,
    },
    SampleDiscarded {
        kind: SensorKind,
        sample: u32,
        error: &'a SensorError,
    },
    CycleCompleted {
        record: &'a CycleRecord,
    },
    RecordStored {
        cycle_index: u32,
        total_records: usize,
    },
    StorageFailed {
        cycle_index: u32,
        error: &'a StorageError,
    },
    /// The stored document could not be read back for the upload; the
    /// in-memory records are sent instead.
    SnapshotFailed {
        error: &'a StorageError,
    },
    Sleeping {
        duration: Duration,
    },
    UploadStarted {
        name: &'a str,
        bytes: usize,
        server: &'a Endpoint,
    },
    UploadCompleted {
        outcome: &'a UploadOutcome,
    },
    UploadFailed {
        error: &'a TransferError,
    },
}

impl Event<'_> {
    /// The lowest report level at which this event is shown
    pub fn level(&self) -> ReportLevel {
        match self {
            Event::StateChanged { .. } | Event::SampleTaken { .. } | Event::Sleeping { .. } => {
                ReportLevel::Verbose
            }
            _ => ReportLevel::Basic,
        }
    }

    /// Whether the event is a storage or transfer failure. Discarded samples
    /// are part of normal operation and do not count.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StorageFailed { .. } | Event::SnapshotFailed { .. } | Event::UploadFailed { .. }
        )
    }
}

/// Sink for report events
pub trait Reporter {
    fn report(&mut self, event: &Event<'_>);
}

impl<R: Reporter + ?Sized> Reporter for &mut R {
    fn report(&mut self, event: &Event<'_>) {
        (**self).report(event)
    }
}

/// Forwards every event to both sinks, first then second
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn report(&mut self, event: &Event<'_>) {
        self.0.report(event);
        self.1.report(event);
    }
}

/// Renders events through the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogReporter {
    level: ReportLevel,
}

impl LogReporter {
    pub const fn new(level: ReportLevel) -> Self {
        Self { level }
    }

    pub const fn level(&self) -> ReportLevel {
        self.level
    }
}

impl Reporter for LogReporter {
    fn report(&mut self, event: &Event<'_>) {
        if !self.level.allows(event.level()) {
            return;
        }

        match event {
            Event::RunStarted {
                cycles,
                restored_records,
            } => info!(
                "(station) Starting run of {} cycles, {} stored records restored",
                cycles, restored_records
            ),
            Event::StateChanged { state } => debug!("(station) State: {:?}", state),
            Event::CycleStarted { cycle_index, total } => {
                info!("(station) ##### CYCLE {} of {} #####", cycle_index + 1, total)
            }
            Event::SampleTaken { sample, reading } => {
                debug!("({}) {}. Measured (partial): {}", reading.kind, sample + 1, reading)
            }
            Event::SampleDiscarded {
                kind,
                sample,
                error,
            } => warn!("({}) {}. Sample discarded: {}", kind, sample + 1, error),
            Event::CycleCompleted { record } => info!("(station) {}", record),
            Event::RecordStored {
                cycle_index,
                total_records,
            } => info!(
                "(storage) Cycle {} stored, {} records in file",
                cycle_index + 1,
                total_records
            ),
            Event::StorageFailed { cycle_index, error } => {
                error!("(storage) Failed to store cycle {}: {}", cycle_index + 1, error)
            }
            Event::SnapshotFailed { error } => {
                error!("(storage) Cannot read back the file, sending stored records: {}", error)
            }
            Event::Sleeping { duration } => {
                debug!("(station) Going to sleep for {:.1} seconds...", duration.as_secs_f64())
            }
            Event::UploadStarted {
                name,
                bytes,
                server,
            } => info!("(tftp) Sending {} ({} bytes) to {}", name, bytes, server),
            Event::UploadCompleted { outcome } => info!(
                "(tftp) File transfer complete: {} bytes in {} blocks",
                outcome.bytes_sent, outcome.blocks
            ),
            Event::UploadFailed { error } => error!("(tftp) Upload failed: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(ReportLevel::Verbose.allows(ReportLevel::Basic));
        assert!(ReportLevel::Verbose.allows(ReportLevel::Verbose));
        assert!(ReportLevel::Basic.allows(ReportLevel::Basic));
        assert!(!ReportLevel::Basic.allows(ReportLevel::Verbose));
        assert!(!ReportLevel::Silent.allows(ReportLevel::Basic));
        assert!(!ReportLevel::Silent.allows(ReportLevel::Silent));
    }

    #[test]
    fn test_failures_are_basic() {
        let error = SensorError::Pin;
        let discarded = Event::SampleDiscarded {
            kind: SensorKind::Distance,
            sample: 0,
            error: &error,
        };
        assert!(!discarded.is_failure());
        assert_eq!(discarded.level(), ReportLevel::Basic);

        let error = StorageError::Write {
            name: "data.json".into(),
            source: std::io::Error::other("disk gone"),
        };
        let failed = Event::StorageFailed {
            cycle_index: 0,
            error: &error,
        };
        assert!(failed.is_failure());
        assert_eq!(failed.level(), ReportLevel::Basic);

        let sleeping = Event::Sleeping {
            duration: Duration::from_secs(1),
        };
        assert!(!sleeping.is_failure());
        assert_eq!(sleeping.level(), ReportLevel::Verbose);
    }
}
