//! Controller configuration
//!
//! Every field has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! [network]
//! send_timeout_ms = 100
//!
//! [discovery]
//! protocol = "wled"
//! timeout_secs = 2.0
//!
//! [show]
//! fps = 30.0
//!
//! [[fixtures]]
//! address = "192.168.1.100"
//! pixel_count = 60
//! name = "Stage Left"
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::dmx::{DiscoveryProtocol, ARTNET_PORT, DEFAULT_PIXEL_COUNT};
use crate::logging::LogConfig;
use crate::scheduler::tick_interval;
use crate::{error::ControlError, Result};

/// Output socket settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Local address of the output socket
    pub bind_address: SocketAddr,
    /// Upper bound for a single send
    pub send_timeout_ms: u64,
    /// Destination port for ArtDmx packets
    pub artnet_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            send_timeout_ms: 100,
            artnet_port: ARTNET_PORT,
        }
    }
}

impl NetworkConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Discovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub protocol: DiscoveryProtocol,
    pub timeout_secs: f64,
    /// Probe port, defaults to the dialect's port
    pub port: Option<u16>,
    pub broadcast_address: IpAddr,
    /// Local address of the discovery socket, defaults per dialect
    pub bind_address: Option<SocketAddr>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            protocol: DiscoveryProtocol::default(),
            timeout_secs: 2.0,
            port: None,
            broadcast_address: IpAddr::V4(Ipv4Addr::BROADCAST),
            bind_address: None,
        }
    }
}

impl DiscoveryConfig {
    pub fn timeout(&self) -> Duration {
        secs_or_max(self.timeout_secs)
    }

    pub fn probe_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Art-Net nodes answer on port 6454, WLED answers the probing socket
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address.unwrap_or_else(|| {
            let port = match self.protocol {
                DiscoveryProtocol::ArtNet => ARTNET_PORT,
                DiscoveryProtocol::Wled => 0,
            };
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
        })
    }
}

/// Frame loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShowConfig {
    pub fps: f64,
    /// Run time, forever when absent
    pub duration_secs: Option<f64>,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            duration_secs: None,
        }
    }
}

impl ShowConfig {
    pub fn duration(&self) -> Option<Duration> {
        self.duration_secs.map(secs_or_max)
    }
}

/// Negative and NaN become zero, anything too large for a `Duration` saturates
fn secs_or_max(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// A fixture registered at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// "ip" or "ip:port"
    pub address: String,
    #[serde(default = "default_pixel_count")]
    pub pixel_count: usize,
    #[serde(default)]
    pub name: Option<String>,
    /// Explicit patch, otherwise the registry picks a universe
    #[serde(default)]
    pub universe: Option<u16>,
    #[serde(default)]
    pub channel_offset: Option<usize>,
}

fn default_pixel_count() -> usize {
    DEFAULT_PIXEL_COUNT
}

impl FixtureConfig {
    /// Resolve the address, using `default_port` when none is given
    pub fn socket_addr(&self, default_port: u16) -> Result<SocketAddr> {
        let text = self.address.trim();
        if let Ok(addr) = text.parse::<SocketAddr>() {
            return Ok(addr);
        }
        text.parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, default_port))
            .map_err(|_| ControlError::Config(format!("Invalid fixture address: {}", self.address)))
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub network: NetworkConfig,
    pub discovery: DiscoveryConfig,
    pub show: ShowConfig,
    pub logging: LogConfig,
    pub fixtures: Vec<FixtureConfig>,
}

impl ControllerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ControlError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ControllerConfig = toml::from_str(contents)
            .map_err(|e| ControlError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Err(e) = tick_interval(self.show.fps) {
            return Err(ControlError::Config(e.to_string()));
        }
        if Duration::try_from_secs_f64(self.discovery.timeout_secs).is_err() {
            return Err(ControlError::Config(format!(
                "discovery timeout must be a non-negative number of seconds, got {}",
                self.discovery.timeout_secs
            )));
        }
        if let Some(duration) = self.show.duration_secs {
            if Duration::try_from_secs_f64(duration).is_err() {
                return Err(ControlError::Config(format!(
                    "duration must be a non-negative number of seconds, got {}",
                    duration
                )));
            }
        }
        for fixture in &self.fixtures {
            fixture.socket_addr(self.network.artnet_port)?;
            if fixture.pixel_count == 0 {
                return Err(ControlError::Config(format!(
                    "Fixture {} has no pixels",
                    fixture.address
                )));
            }
        }
        Ok(())
    }
}
