//! Hardware-independent core library for sonde
//!
//! This crate contains the measurement-and-delivery core of the sonde station:
//! signal conversion, sensor sampling, per-cycle aggregation, the measurement
//! file store, the TFTP upload client and the cycle scheduler tying them
//! together.
//!
//! Hardware access goes through `embedded-hal` traits so the same code drives
//! real pins on the device and mocks/fakes on a desktop host (for the station
//! runner and tests).
//!
//! ```text
//! CycleScheduler ──▶ CycleAggregator ──▶ SensorSampler ──▶ SignalConverter
//!       │
//!       ├──▶ MeasurementStore (append after every cycle)
//!       ├──▶ Uploader (once, after the last cycle)
//!       └──▶ Reporter (console log, status LED)
//! ```

pub mod aggregator;
pub mod config;
pub mod convert;
pub mod record;
pub mod report;
pub mod scheduler;
pub mod sensors;
pub mod status;
pub mod storage;
pub mod time;
pub mod upload;

pub use aggregator::CycleAggregator;
pub use config::{ConfigError, Endpoint, StationConfig, StoreMode, TransferConfig};
pub use record::{CycleRecord, Stats};
pub use report::{Event, LogReporter, ReportLevel, Reporter};
pub use scheduler::{CycleScheduler, RunError, RunSummary, SchedulerState};
pub use sensors::{PhysicalReading, RawSample, SensorError, SensorKind, SensorSampler, Unit};
pub use status::StatusLed;
pub use storage::{
    FileBackend, MeasurementFile, MeasurementStore, MemoryBackend, StorageBackend, StorageError,
};
pub use upload::{RejectReason, TftpClient, TransferError, UploadOutcome, Uploader};
