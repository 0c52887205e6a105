//! DMX over Ethernet
//!
//! This module provides the wire formats spoken by the controller.
//!
//! ## Art-Net
//!
//! Art-Net is a UDP protocol for DMX transmission over Ethernet.
//! - Uses UDP port 6454 for both output and discovery
//! - Supports 32768 universes (15-bit port-address)
//! - Includes sequence numbering
//!
//! ## WLED
//!
//! WLED firmware answers a JSON probe on UDP port 21324 with its name and LED
//! count. The controller still drives WLED nodes with Art-Net.
//!
//! ## Example Usage
//!
//! ```rust
//! use ledflow_core::dmx::{ArtDmx, ArtNetCodec};
//!
//! # fn main() -> ledflow_core::Result<()> {
//! let mut codec = ArtNetCodec::new();
//! let packet = codec.encode(5, &[255, 0, 0, 0, 255, 0])?;
//!
//! let decoded = ArtDmx::parse(&packet).unwrap();
//! assert_eq!(decoded.universe, 5);
//! assert_eq!(decoded.sequence, 1);
//! # Ok(())
//! # }
//! ```

pub mod artnet;
pub mod wled;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use artnet::{ArtDmx, ArtNetCodec, ArtPollReply};

/// UDP port for Art-Net output and discovery
pub const ARTNET_PORT: u16 = 6454;

/// Channels in one DMX universe
pub const UNIVERSE_SIZE: usize = 512;

/// Channels per RGB pixel
pub const CHANNELS_PER_PIXEL: usize = 3;

/// Whole RGB pixels fitting in one universe (170 * 3 = 510)
pub const MAX_PIXELS_PER_UNIVERSE: usize = UNIVERSE_SIZE / CHANNELS_PER_PIXEL;

/// Highest Art-Net port-address
pub const MAX_UNIVERSE: u16 = 0x7FFF;

/// Pixel count assumed when a device does not advertise one
pub const DEFAULT_PIXEL_COUNT: usize = 60;

/// Discovery dialect used to find fixtures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryProtocol {
    /// ArtPoll / ArtPollReply on the Art-Net port
    #[default]
    ArtNet,
    /// WLED JSON info probe
    Wled,
}

impl DiscoveryProtocol {
    /// Port the probe is broadcast to
    pub fn default_port(self) -> u16 {
        match self {
            DiscoveryProtocol::ArtNet => ARTNET_PORT,
            DiscoveryProtocol::Wled => wled::DISCOVERY_PORT,
        }
    }

    /// Probe datagram for this dialect
    pub fn probe(self) -> Vec<u8> {
        match self {
            DiscoveryProtocol::ArtNet => ArtNetCodec::poll_packet().to_vec(),
            DiscoveryProtocol::Wled => wled::DISCOVERY_PROBE.to_vec(),
        }
    }
}

impl fmt::Display for DiscoveryProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryProtocol::ArtNet => write!(f, "artnet"),
            DiscoveryProtocol::Wled => write!(f, "wled"),
        }
    }
}

impl FromStr for DiscoveryProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "artnet" | "art-net" => Ok(DiscoveryProtocol::ArtNet),
            "wled" => Ok(DiscoveryProtocol::Wled),
            other => Err(format!("unknown discovery protocol: {}", other)),
        }
    }
}

/// What a device told us about itself in a discovery reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: Option<String>,
    pub pixel_count: Option<usize>,
    pub protocol: DiscoveryProtocol,
}

/// Decode a discovery reply of any supported dialect.
///
/// Returns `None` for datagrams that carry neither an Art-Net poll reply nor a
/// WLED info object. Those are foreign traffic and are ignored.
pub fn decode_discovery_reply(datagram: &[u8]) -> Option<DeviceInfo> {
    if datagram.starts_with(artnet::ARTNET_ID) {
        return ArtPollReply::parse(datagram).map(DeviceInfo::from);
    }
    wled::parse_info(datagram)
}
