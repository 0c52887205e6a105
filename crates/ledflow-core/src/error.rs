//! Error types for the transmission engine
use std::net::SocketAddr;

use thiserror::Error;

/// Controller errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// Channel data does not fit into one DMX universe
    #[error("Encode error: {len} bytes of channel data exceed the 512 channel limit")]
    Encode { len: usize },

    /// Art-Net port-addresses are 15 bits wide
    #[error("Universe {0} is out of range (0-32767)")]
    UniverseOutOfRange(u32),

    /// Manual registration of an address that is already known
    #[error("Fixture already registered at {0}")]
    DuplicateFixture(SocketAddr),

    /// Explicit patch collides with an existing allocation
    #[error("Fixture at {address} overlaps universe {universe} channels {start}..{end}")]
    FixtureOverlap {
        address: SocketAddr,
        universe: u16,
        start: usize,
        end: usize,
    },

    /// No free run of universes left for a new fixture
    #[error("No free universe range for {0} universe(s)")]
    UniversesExhausted(usize),

    /// Fixture is not part of the registry
    #[error("Unknown fixture: {0}")]
    UnknownFixture(SocketAddr),

    /// Pattern produced a frame of the wrong size
    #[error("Frame length mismatch: expected {expected} pixels, got {actual}")]
    FrameLength { expected: usize, actual: usize },

    /// Sending a packet to one fixture failed
    #[error("Transmission to {address} (universe {universe}) failed: {source}")]
    Transmission {
        address: SocketAddr,
        universe: u16,
        #[source]
        source: std::io::Error,
    },

    /// Run requested with an empty registry
    #[error("No fixtures registered")]
    NoFixtures,

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControlError>;
