//! Station configuration
//!
//! The configuration is read once at startup and then handed to the scheduler
//! by reference. Durations are written in seconds in the JSON document, e.g.
//!
//! ```json
//! {
//!   "num_of_cycles": 10,
//!   "num_of_measurements": 10,
//!   "sleep_between_cycles": 60,
//!   "sleep_between_temperature": 3,
//!   "sleep_between_distance": 1,
//!   "measurement_filename": "data.json",
//!   "transfer": { "server": { "host": "192.168.1.10", "port": 69 } }
//! }
//! ```

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::ReportLevel;

/// Default TFTP server port
pub const DEFAULT_TFTP_PORT: u16 = 69;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    ZeroCount { field: &'static str },
    #[error("measurement filename is empty")]
    EmptyFilename,
    #[error("transfer server host is empty")]
    EmptyHost,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How the measurement file is treated when a run starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// Ignore any previous file; the first append replaces it.
    Fresh,
    /// Load the previous file and keep appending to it.
    #[default]
    Append,
}

/// Network address of the remote collector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_TFTP_PORT)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Settings for the upload transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub server: Endpoint,
    /// How long to wait for each reply from the server
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Pause after each acknowledged data block, to avoid flooding the server
    #[serde(with = "duration_secs")]
    pub block_pause: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            server: Endpoint::default(),
            timeout: Duration::from_secs(5),
            block_pause: Duration::from_millis(500),
        }
    }
}

/// Immutable configuration record for one station run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Number of measurement cycles before the file is uploaded
    pub num_of_cycles: u32,
    /// Samples taken per sensor in each cycle
    pub num_of_measurements: u32,
    #[serde(with = "duration_secs")]
    pub sleep_between_cycles: Duration,
    #[serde(with = "duration_secs")]
    pub sleep_between_temperature: Duration,
    #[serde(with = "duration_secs")]
    pub sleep_between_distance: Duration,
    pub measurement_filename: PathBuf,
    pub store_mode: StoreMode,
    pub report_level: ReportLevel,
    /// Adjust the speed of sound with the cycle's mean temperature
    pub compensate_speed_of_sound: bool,
    pub transfer: TransferConfig,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            num_of_cycles: 10,
            num_of_measurements: 10,
            sleep_between_cycles: Duration::from_secs(60),
            sleep_between_temperature: Duration::from_secs(3),
            sleep_between_distance: Duration::from_secs(1),
            measurement_filename: PathBuf::from("data.json"),
            store_mode: StoreMode::default(),
            report_level: ReportLevel::Basic,
            compensate_speed_of_sound: false,
            transfer: TransferConfig::default(),
        }
    }
}

impl StationConfig {
    /// Parse and validate a JSON config document. Missing fields take their defaults.
    pub fn from_json(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&document)
    }

    /// Check the invariants the rest of the core relies on.
    ///
    /// Durations are already guaranteed non-negative by their type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_of_cycles == 0 {
            return Err(ConfigError::ZeroCount {
                field: "num_of_cycles",
            });
        }
        if self.num_of_measurements == 0 {
            return Err(ConfigError::ZeroCount {
                field: "num_of_measurements",
            });
        }
        if self.measurement_filename.as_os_str().is_empty() {
            return Err(ConfigError::EmptyFilename);
        }
        if self.transfer.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(())
    }
}

/// Serde helper storing a `Duration` as (fractional) seconds.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            D::Error::custom(format!("invalid duration {secs}, expected seconds >= 0"))
        })
    }
}
