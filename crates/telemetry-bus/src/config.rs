use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::registry::{DEFAULT_BPS, DEFAULT_MAX_PACKET_SIZE};

fn default_ingest_addr() -> SocketAddr {
    "0.0.0.0:3000".parse().unwrap()
}
fn default_telecommand_addr() -> SocketAddr {
    "0.0.0.0:3001".parse().unwrap()
}
fn default_downlink_bind_addr() -> SocketAddr {
    "0.0.0.0:3002".parse().unwrap()
}
fn default_downlink_target_addr() -> SocketAddr {
    "127.0.0.1:3003".parse().unwrap()
}
fn default_request_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}
fn default_spectrometer_shm_name() -> String {
    "/bcp_spectrometer_data".to_string()
}
fn default_spectrometer_poll_interval_ms() -> u64 {
    50
}

/// Runtime configuration for the bus, merged in this order: built-in
/// defaults → TOML config file → CLI flags (highest priority).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bps: u32,
    pub max_packet_size: u32,
    #[serde(with = "serde_socket_addr")]
    pub ingest_addr: SocketAddr,
    #[serde(with = "serde_socket_addr")]
    pub telecommand_addr: SocketAddr,
    #[serde(with = "serde_socket_addr")]
    pub downlink_bind_addr: SocketAddr,
    #[serde(with = "serde_socket_addr")]
    pub downlink_target_addr: SocketAddr,
    #[serde(with = "serde_socket_addr")]
    pub request_addr: SocketAddr,
    pub spectrometer_shm_name: String,
    pub spectrometer_poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bps: DEFAULT_BPS,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            ingest_addr: default_ingest_addr(),
            telecommand_addr: default_telecommand_addr(),
            downlink_bind_addr: default_downlink_bind_addr(),
            downlink_target_addr: default_downlink_target_addr(),
            request_addr: default_request_addr(),
            spectrometer_shm_name: default_spectrometer_shm_name(),
            spectrometer_poll_interval_ms: default_spectrometer_poll_interval_ms(),
        }
    }
}

impl Config {
    /// Loads a config file if present, falling back to defaults; a
    /// present-but-unreadable or malformed file is a fatal error, a
    /// missing one is not (per §6.8).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(bps) = cli.bps {
            self.bps = bps;
        }
        if let Some(max_packet_size) = cli.max_packet_size {
            self.max_packet_size = max_packet_size;
        }
        if let Some(addr) = cli.ingest_addr {
            self.ingest_addr = addr;
        }
        if let Some(addr) = cli.telecommand_addr {
            self.telecommand_addr = addr;
        }
        if let Some(addr) = cli.downlink_bind_addr {
            self.downlink_bind_addr = addr;
        }
        if let Some(addr) = cli.downlink_target_addr {
            self.downlink_target_addr = addr;
        }
        if let Some(addr) = cli.request_addr {
            self.request_addr = addr;
        }
    }
}

/// Command-line overrides for [`Config`]. Every flag is optional: absence
/// means "inherit the config-file/default value".
#[derive(Debug, Parser)]
#[command(name = "telemetry-bus", about = "Onboard telemetry bus for a balloon-borne instrument platform")]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long, default_value = "./telemetry-bus.toml")]
    pub config: PathBuf,

    #[arg(long)]
    pub bps: Option<u32>,

    #[arg(long)]
    pub max_packet_size: Option<u32>,

    #[arg(long)]
    pub ingest_addr: Option<SocketAddr>,

    #[arg(long)]
    pub telecommand_addr: Option<SocketAddr>,

    #[arg(long)]
    pub downlink_bind_addr: Option<SocketAddr>,

    #[arg(long)]
    pub downlink_target_addr: Option<SocketAddr>,

    #[arg(long)]
    pub request_addr: Option<SocketAddr>,
}

mod serde_socket_addr {
    use serde::{Deserialize, Deserializer};
    use std::net::SocketAddr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
