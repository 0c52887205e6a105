//! Art-Net protocol implementation (Art-Net 4)
//!
//! Only the packets the controller needs: ArtDmx for output, ArtPoll as the
//! discovery probe and enough of ArtPollReply to learn a node's name.

use super::{DeviceInfo, DiscoveryProtocol, MAX_UNIVERSE, UNIVERSE_SIZE};
use crate::{error::ControlError, Result};

/// Packet ID shared by every Art-Net packet
pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";

/// OpCode for ArtPoll
pub const OP_POLL: u16 = 0x2000;

/// OpCode for ArtPollReply
pub const OP_POLL_REPLY: u16 = 0x2100;

/// OpCode for ArtDmx (OpOutput)
pub const OP_DMX: u16 = 0x5000;

/// Art-Net 4
pub const PROTOCOL_VERSION: u16 = 14;

/// Size of the ArtDmx header preceding the channel data
pub const DMX_HEADER_LEN: usize = 18;

const SHORT_NAME: std::ops::Range<usize> = 26..44;
const LONG_NAME: std::ops::Range<usize> = 44..108;

/// Art-Net encoder holding the running sequence number
#[derive(Debug, Clone)]
pub struct ArtNetCodec {
    sequence: u8,
    sequencing: bool,
    physical: u8,
}

impl Default for ArtNetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtNetCodec {
    /// Create a codec with sequencing enabled, physical port 0
    pub fn new() -> Self {
        Self {
            sequence: 0,
            sequencing: true,
            physical: 0,
        }
    }

    /// Create a codec that marks every packet with sequence 0 (disabled)
    pub fn without_sequencing() -> Self {
        Self {
            sequencing: false,
            ..Self::new()
        }
    }

    /// Set the physical input port reported in ArtDmx packets
    pub fn with_physical(mut self, physical: u8) -> Self {
        self.physical = physical;
        self
    }

    /// Sequence number carried by the most recent packet
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    fn next_sequence(&mut self) -> u8 {
        if !self.sequencing {
            return 0;
        }
        // 0 means "sequencing disabled" to receivers, so it is never emitted
        self.sequence = self.sequence.wrapping_add(1);
        if self.sequence == 0 {
            self.sequence = 1;
        }
        self.sequence
    }

    /// Build an ArtDmx packet
    ///
    /// # Arguments
    /// * `universe` - Art-Net port-address (0-32767)
    /// * `channels` - Channel values, at most 512. Odd lengths are padded with a
    ///   trailing zero, empty data is sent as two zero channels.
    pub fn encode(&mut self, universe: u16, channels: &[u8]) -> Result<Vec<u8>> {
        if channels.len() > UNIVERSE_SIZE {
            return Err(ControlError::Encode {
                len: channels.len(),
            });
        }
        if universe > MAX_UNIVERSE {
            return Err(ControlError::UniverseOutOfRange(universe as u32));
        }

        let length = channels.len().max(2).next_multiple_of(2);
        let mut packet = vec![0u8; DMX_HEADER_LEN + length];

        // Header: "Art-Net\0"
        packet[0..8].copy_from_slice(ARTNET_ID);

        // OpCode: OpDmx (0x5000)
        packet[8..10].copy_from_slice(&OP_DMX.to_le_bytes());

        // Protocol version (14)
        packet[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());

        packet[12] = self.next_sequence();
        packet[13] = self.physical;

        // Universe (Port-Address)
        packet[14..16].copy_from_slice(&universe.to_le_bytes());

        // Length (big-endian)
        packet[16..18].copy_from_slice(&(length as u16).to_be_bytes());

        packet[DMX_HEADER_LEN..DMX_HEADER_LEN + channels.len()].copy_from_slice(channels);

        Ok(packet)
    }

    /// Build an ArtPoll packet (discovery probe)
    pub fn poll_packet() -> [u8; 14] {
        let mut packet = [0u8; 14];
        packet[0..8].copy_from_slice(ARTNET_ID);
        packet[8..10].copy_from_slice(&OP_POLL.to_le_bytes());
        packet[10..12].copy_from_slice(&PROTOCOL_VERSION.to_be_bytes());
        // Flags and DiagPriority stay 0: no diagnostics, reply only when polled
        packet
    }
}

fn opcode(datagram: &[u8]) -> Option<u16> {
    if datagram.len() < 10 || &datagram[0..8] != ARTNET_ID {
        return None;
    }
    Some(u16::from_le_bytes([datagram[8], datagram[9]]))
}

/// A decoded ArtDmx packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    pub sequence: u8,
    pub physical: u8,
    pub universe: u16,
    pub data: Vec<u8>,
}

impl ArtDmx {
    /// Parse an ArtDmx datagram, `None` for anything else
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        if datagram.len() < DMX_HEADER_LEN || opcode(datagram)? != OP_DMX {
            return None;
        }
        let length = u16::from_be_bytes([datagram[16], datagram[17]]) as usize;
        let data = datagram.get(DMX_HEADER_LEN..DMX_HEADER_LEN + length)?;

        Some(Self {
            sequence: datagram[12],
            physical: datagram[13],
            universe: u16::from_le_bytes([datagram[14], datagram[15]]) & MAX_UNIVERSE,
            data: data.to_vec(),
        })
    }
}

/// The parts of an ArtPollReply the controller cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPollReply {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

impl ArtPollReply {
    /// Parse an ArtPollReply. Truncated replies keep whatever fields they carry.
    pub fn parse(datagram: &[u8]) -> Option<Self> {
        if opcode(datagram)? != OP_POLL_REPLY {
            return None;
        }
        Some(Self {
            short_name: datagram.get(SHORT_NAME).and_then(nul_terminated),
            long_name: datagram.get(LONG_NAME).and_then(nul_terminated),
        })
    }

    /// Preferred display name
    pub fn name(&self) -> Option<&str> {
        self.short_name.as_deref().or(self.long_name.as_deref())
    }
}

impl From<ArtPollReply> for DeviceInfo {
    fn from(reply: ArtPollReply) -> Self {
        DeviceInfo {
            name: reply.name().map(str::to_string),
            pixel_count: None,
            protocol: DiscoveryProtocol::ArtNet,
        }
    }
}

fn nul_terminated(field: &[u8]) -> Option<String> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = String::from_utf8_lossy(&field[..end]);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
