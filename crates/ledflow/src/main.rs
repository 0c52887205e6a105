//! # LedFlow
//!
//! Drives addressable LED fixtures over Art-Net.
//!
//! ```bash
//! # Find fixtures and list them
//! ledflow discover --protocol wled
//!
//! # Red chase for ten seconds
//! ledflow run chase --color red --duration 10
//!
//! # Everything off
//! ledflow blackout
//! ```

mod cli;
mod commands;
mod logging_setup;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use ledflow_core::ControllerConfig;
use tracing::{error, info};

use crate::cli::{Cli, Command};

/// Read by default when `--config` is not given
const DEFAULT_CONFIG_FILE: &str = "ledflow.toml";

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    let config = match path {
        Some(path) => ControllerConfig::load(path)?,
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default.exists() {
                ControllerConfig::load(&default)?
            } else {
                ControllerConfig::default()
            }
        }
    };
    Ok(config)
}

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(cli: &Cli, config: &mut ControllerConfig) -> Result<()> {
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.log_file {
        config.logging.file_output = true;
    }
    if let Command::Discover { timeout, protocol } = &cli.command {
        if let Some(timeout) = timeout {
            config.discovery.timeout_secs = *timeout;
        }
        if let Some(protocol) = protocol {
            config.discovery.protocol = *protocol;
        }
    }
    config.validate()?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = apply_overrides(&cli, &mut config) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = match logging_setup::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    info!("LedFlow v{}", env!("CARGO_PKG_VERSION"));

    match commands::execute(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_discovery() {
        let cli = Cli::try_parse_from([
            "ledflow",
            "discover",
            "--timeout",
            "0.5",
            "--protocol",
            "wled",
            "--log-level",
            "warn",
        ])
        .unwrap();
        let mut config = ControllerConfig::default();
        apply_overrides(&cli, &mut config).unwrap();

        assert_eq!(config.discovery.timeout_secs, 0.5);
        assert_eq!(config.discovery.protocol, ledflow_core::DiscoveryProtocol::Wled);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_negative_timeout_rejected() {
        let cli = Cli::try_parse_from(["ledflow", "discover", "--timeout=-1"]).unwrap();
        let mut config = ControllerConfig::default();
        assert!(apply_overrides(&cli, &mut config).is_err());
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let cli = Cli::try_parse_from(["ledflow", "discover", "--timeout", "1e30"]).unwrap();
        let mut config = ControllerConfig::default();
        assert!(apply_overrides(&cli, &mut config).is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.toml");
        std::fs::write(&path, "[show]\nfps = 40.0\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.show.fps, 40.0);
        assert!(load_config(Some(&dir.path().join("missing.toml"))).is_err());
    }
}
