//! The station's control loop
//!
//! ```text
//! Idle ─▶ Running(0) ─▶ Sleeping(1) ─▶ … ─▶ Running(n-1) ─▶ Uploading ─▶ Done
//! ```
//!
//! Every cycle's record is appended to the store as soon as it is complete. A
//! failed append is reported and the loop carries on; the upload after the
//! last cycle sends whatever the stored document holds at that point. If the
//! document cannot be read back, the records held in memory are sent.

use embedded_hal::delay::DelayNs;
use thiserror::Error;

use crate::aggregator::CycleAggregator;
use crate::config::{ConfigError, StationConfig};
use crate::report::{Event, Reporter};
use crate::sensors::SensorSampler;
use crate::storage::{MeasurementStore, StorageBackend, StorageError};
use crate::time::{Clock, delay_for};
use crate::upload::{TransferError, UploadOutcome, Uploader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running { cycle_index: u32 },
    Sleeping { next_cycle: u32 },
    Uploading,
    Done,
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("measurement storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("upload failed: {0}")]
    Transfer(#[from] TransferError),
}

/// What a successful run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles_completed: u32,
    /// Records this run appended to the store
    pub records_stored: u32,
    pub storage_failures: u32,
    /// Samples dropped over all cycles, both sensors
    pub discarded_samples: u32,
    pub outcome: UploadOutcome,
}

/// Runs the configured number of cycles, then uploads the measurement file once.
pub struct CycleScheduler<'a, S, C, B, U, D, R> {
    config: &'a StationConfig,
    aggregator: CycleAggregator<'a, S, C>,
    store: MeasurementStore<B>,
    uploader: U,
    delay: D,
    reporter: R,
    state: SchedulerState,
}

impl<'a, S, C, B, U, D, R> CycleScheduler<'a, S, C, B, U, D, R>
where
    S: SensorSampler,
    C: Clock,
    B: StorageBackend,
    U: Uploader,
    D: DelayNs,
    R: Reporter,
{
    pub fn new(
        config: &'a StationConfig,
        aggregator: CycleAggregator<'a, S, C>,
        store: MeasurementStore<B>,
        uploader: U,
        delay: D,
        reporter: R,
    ) -> Result<Self, RunError> {
        config.validate()?;

        Ok(Self {
            config,
            aggregator,
            store,
            uploader,
            delay,
            reporter,
            state: SchedulerState::Idle,
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    fn transition(&mut self, state: SchedulerState) {
        self.state = state;
        self.reporter.report(&Event::StateChanged { state });
    }

    /// Run every cycle and the final upload. Consumes the scheduler: a run
    /// ends in [`SchedulerState::Done`] and is never restarted.
    pub fn run(mut self) -> Result<RunSummary, RunError> {
        let total = self.config.num_of_cycles;
        self.reporter.report(&Event::RunStarted {
            cycles: total,
            restored_records: self.store.records().len(),
        });

        let mut records_stored = 0;
        let mut storage_failures = 0;
        let mut discarded_samples = 0;

        for cycle_index in 0..total {
            self.transition(SchedulerState::Running { cycle_index });
            self.reporter.report(&Event::CycleStarted { cycle_index, total });

            let record = self
                .aggregator
                .run_cycle(cycle_index, &mut self.delay, &mut self.reporter);
            discarded_samples += record.distance.discarded + record.temperature.discarded;
            self.reporter.report(&Event::CycleCompleted { record: &record });

            match self.store.append(record) {
                Ok(total_records) => {
                    records_stored += 1;
                    self.reporter.report(&Event::RecordStored {
                        cycle_index,
                        total_records,
                    });
                }
                Err(error) => {
                    storage_failures += 1;
                    self.reporter.report(&Event::StorageFailed {
                        cycle_index,
                        error: &error,
                    });
                }
            }

            if cycle_index + 1 < total {
                self.transition(SchedulerState::Sleeping {
                    next_cycle: cycle_index + 1,
                });
                self.reporter.report(&Event::Sleeping {
                    duration: self.config.sleep_between_cycles,
                });
                delay_for(&mut self.delay, self.config.sleep_between_cycles);
            }
        }

        self.transition(SchedulerState::Uploading);
        let file = match self.store.snapshot() {
            Ok(file) => file,
            Err(error) => {
                storage_failures += 1;
                self.reporter.report(&Event::SnapshotFailed { error: &error });
                match self.store.encoded() {
                    Ok(file) => file,
                    Err(error) => {
                        self.transition(SchedulerState::Done);
                        return Err(error.into());
                    }
                }
            }
        };
        let server = &self.config.transfer.server;
        self.reporter.report(&Event::UploadStarted {
            name: &file.name,
            bytes: file.len(),
            server,
        });

        let result = self.uploader.upload(&file, server);
        self.transition(SchedulerState::Done);

        match result {
            Ok(outcome) => {
                self.store.mark_uploaded();
                self.reporter.report(&Event::UploadCompleted { outcome: &outcome });
                Ok(RunSummary {
                    cycles_completed: total,
                    records_stored,
                    storage_failures,
                    discarded_samples,
                    outcome,
                })
            }
            Err(error) => {
                self.reporter.report(&Event::UploadFailed { error: &error });
                Err(error.into())
            }
        }
    }
}
