//! Network settings taken from the environment
//!
//! Wi-Fi association and NTP sync are done by the host before the station
//! starts; their settings are only logged here. The TFTP values override the
//! transfer endpoint of the station config.

use core::fmt;

use log::info;
use sonde_core::StationConfig;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetworkError {
    #[error("TFTP_PORT must be a port number, got {0:?}")]
    InvalidPort(String),
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct NetworkConfig {
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub ntp_server: Option<String>,
    pub timezone: Option<String>,
    pub tftp_server: Option<String>,
    pub tftp_port: Option<u16>,
}

// The password never ends up in logs
impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &self.wifi_password.as_ref().map(|_| "***"))
            .field("ntp_server", &self.ntp_server)
            .field("timezone", &self.timezone)
            .field("tftp_server", &self.tftp_server)
            .field("tftp_port", &self.tftp_port)
            .finish()
    }
}

impl NetworkConfig {
    /// Read the settings through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NetworkError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let tftp_port = get("TFTP_PORT")
            .map(|port| port.parse::<u16>().map_err(|_| NetworkError::InvalidPort(port)))
            .transpose()?;

        Ok(Self {
            wifi_ssid: get("WIFI_SSID"),
            wifi_password: get("WIFI_PASSWORD"),
            ntp_server: get("NTP_SERVER"),
            timezone: get("TIMEZONE"),
            tftp_server: get("TFTP_SERVER"),
            tftp_port,
        })
    }

    pub fn from_env() -> Result<Self, NetworkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Point the transfer at the configured TFTP server.
    pub fn apply(&self, config: &mut StationConfig) {
        if let Some(host) = &self.tftp_server {
            config.transfer.server.host = host.clone();
        }
        if let Some(port) = self.tftp_port {
            config.transfer.server.port = port;
        }
    }

    pub fn log_summary(&self) {
        if let Some(ssid) = &self.wifi_ssid {
            info!("(wifi) Network {}", ssid);
        }
        if let Some(server) = &self.ntp_server {
            info!(
                "(ntp) Time server {}, timezone {}",
                server,
                self.timezone.as_deref().unwrap_or("UTC")
            );
        }
    }
}
