use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ledflow_core::{DiscoveryProtocol, Rgb};
use ledflow_patterns::PatternKind;

/// Art-Net LED fixture controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Examples:
  ledflow discover
  ledflow run chase --color red --duration 10
  ledflow run rainbow --speed 1.0
  ledflow run strobe --color white --fps 10
  ledflow run chase --no-discovery
  ledflow off
  ledflow blackout --force")]
pub struct Cli {
    /// Configuration file, ledflow.toml in the working directory when present
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Also write logs to the configured log directory
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find fixtures on the local network
    Discover {
        /// Discovery timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Discovery dialect (artnet or wled)
        #[arg(long)]
        protocol: Option<DiscoveryProtocol>,
    },

    /// Show the configured fixtures and their universes
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Run a pattern on every fixture
    Run {
        /// chase, strobe, rainbow, wave or solid
        pattern: PatternKind,

        /// Color name or #rrggbb
        #[arg(long, default_value = "white")]
        color: Rgb,

        /// Frames per second, defaults to the configured rate
        #[arg(long)]
        fps: Option<f64>,

        /// Run time in seconds, runs until Ctrl-C when omitted
        #[arg(long)]
        duration: Option<f64>,

        /// Rainbow speed
        #[arg(long, default_value_t = 1.0)]
        speed: f32,

        /// Wave frequency
        #[arg(long, default_value_t = 1.0)]
        frequency: f32,

        /// Wave amplitude
        #[arg(long, default_value_t = 0.5)]
        amplitude: f32,

        /// Use only the configured fixtures (for Art-Net nodes that ignore discovery)
        #[arg(long)]
        no_discovery: bool,
    },

    /// Turn off all fixtures
    Off,

    /// Emergency blackout, discovering fixtures first if none are configured
    Blackout {
        /// Report success even when no fixture was found
        #[arg(long)]
        force: bool,
    },
}
