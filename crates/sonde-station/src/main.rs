//! Host runner for the sonde measurement station.
//!
//! Runs the full measurement-and-delivery core against simulated sensors: the
//! configured number of cycles are measured and appended to the measurement
//! file, which is then sent to the TFTP server.
//!
//! ```text
//! sonde-station [config.json]
//! ```
//!
//! Without a config file the station defaults apply. Network settings
//! (`WIFI_SSID`, `WIFI_PASSWORD`, `NTP_SERVER`, `TIMEZONE`, `TFTP_SERVER`,
//! `TFTP_PORT`) are read from the environment and an optional `.env` file.
//! Log output is controlled with `RUST_LOG` (default `info`).

mod network;
mod simulated;

use std::process::ExitCode;
use std::time::Duration;

use log::{error, info, warn};
use thiserror::Error;

use sonde_core::time::{StdDelay, SystemClock};
use sonde_core::{
    ConfigError, CycleAggregator, CycleScheduler, FileBackend, LogReporter, MeasurementStore,
    RunError, RunSummary, StationConfig, StorageBackend, TftpClient,
};

use network::{NetworkConfig, NetworkError};
use simulated::SimulatedSampler;

#[derive(Error, Debug)]
enum StationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Run(#[from] RunError),
}

fn load_config() -> Result<StationConfig, StationError> {
    let mut config = match std::env::args_os().nth(1) {
        Some(path) => {
            info!("(station) Loading config from {}", path.to_string_lossy());
            StationConfig::load(path)?
        }
        None => StationConfig::default(),
    };

    let network = NetworkConfig::from_env()?;
    network.log_summary();
    network.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn run(config: &StationConfig) -> Result<RunSummary, StationError> {
    let backend = FileBackend::new(&config.measurement_filename);
    info!(
        "(station) {} cycles of {} measurements, uploading {} to {}",
        config.num_of_cycles,
        config.num_of_measurements,
        backend.name(),
        config.transfer.server
    );

    let sampler = SimulatedSampler::new(Duration::from_secs(1));
    let aggregator = CycleAggregator::new(config, sampler, SystemClock);
    let store = MeasurementStore::open(backend, config.store_mode).map_err(RunError::from)?;

    let scheduler = CycleScheduler::new(
        config,
        aggregator,
        store,
        TftpClient::from_config(&config.transfer),
        StdDelay,
        LogReporter::new(config.report_level),
    )?;
    Ok(scheduler.run()?)
}

fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!("(station) Ignoring unreadable .env file: {}", e);
        }
    }

    info!("Starting sonde station");
    let result = load_config().and_then(|config| run(&config));

    match result {
        Ok(summary) => {
            info!(
                "(station) Done: {} cycles, {} stored, {} storage failures, {} samples discarded",
                summary.cycles_completed,
                summary.records_stored,
                summary.storage_failures,
                summary.discarded_samples
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("(station) {}", e);
            ExitCode::FAILURE
        }
    }
}
