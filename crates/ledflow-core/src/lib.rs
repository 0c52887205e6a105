//! LedFlow Core - Art-Net transmission engine for addressable LED fixtures
//!
//! This crate drives LED fixtures over Ethernet with Art-Net:
//! - **Discovery**: ArtPoll or WLED broadcast probes with a reply timeout
//! - **Registry**: fixture to universe/offset mapping, frame slicing
//! - **Codec**: ArtDmx encoding with sequence numbers
//! - **Scheduler**: fixed-rate frame loop with cooperative cancellation
//!
//! ## Quick Start
//!
//! ```rust
//! use ledflow_core::{FixtureRegistry, Rgb};
//!
//! # fn main() -> ledflow_core::Result<()> {
//! let mut registry = FixtureRegistry::new();
//! let fixture = registry.add_manual("192.168.1.100:6454".parse().unwrap(), 3, Some("Bar"))?;
//! assert_eq!(fixture.universe(), 100);
//!
//! let frame = vec![Rgb::RED, Rgb::GREEN, Rgb::BLUE];
//! let slices = registry.slices(&frame)?;
//! assert_eq!(slices[0].pixels.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`dmx`] - Art-Net and WLED wire formats
//! - [`fixture`] - Fixture registry
//! - [`discovery`] - Discovery service
//! - [`pattern`] - Colors and the pattern trait
//! - [`scheduler`] - Frame loop
//! - [`transport`] - UDP transport
//! - [`controller`] - Open/close context handle
//! - [`config`] - Configuration model
//! - [`logging`] - Logging settings
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Configuration model
pub mod config;
/// Controller context
pub mod controller;
/// Fixture discovery
pub mod discovery;
/// DMX over Ethernet wire formats
pub mod dmx;
/// Error types
pub mod error;
/// Fixture registry
pub mod fixture;
/// Logging settings
pub mod logging;
/// Colors and the pattern capability
pub mod pattern;
/// Frame loop
pub mod scheduler;
/// UDP transport
pub mod transport;

// Re-exports
pub use config::{ControllerConfig, DiscoveryConfig, FixtureConfig, NetworkConfig, ShowConfig};
pub use controller::Controller;
pub use discovery::DiscoveryService;
pub use dmx::{ArtDmx, ArtNetCodec, DeviceInfo, DiscoveryProtocol};
pub use error::{ControlError, Result};
pub use fixture::{
    Fixture, FixtureDescriptor, FixtureRegistry, FixtureSlice, FixtureSource, UniverseAllocation,
};
pub use logging::LogConfig;
pub use pattern::{pixels_to_channels, Frame, PatternSource, Rgb};
pub use scheduler::{
    tick_interval, CancelHandle, FrameEvent, FrameObserver, FrameScheduler, RunOptions,
    RunOutcome, RunSummary, SchedulerState, TickReport, TransmissionFailure,
};
pub use transport::{Transport, UdpTransport};
