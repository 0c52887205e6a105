//! Subcommand handlers. Output meant for the user goes to stdout, logs to stderr.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use ledflow_core::{
    tick_interval, Controller, ControllerConfig, Fixture, FixtureRegistry, FrameEvent,
    FrameObserver, Rgb, RunOptions, RunOutcome,
};
use ledflow_patterns::{create_pattern, PatternKind, PatternOptions};
use tracing::{debug, info, warn};

use crate::cli::Command;

/// Extra all-off rounds a blackout sends, in case packets are dropped
const BLACKOUT_REPEATS: usize = 3;

pub async fn execute(command: Command, config: ControllerConfig) -> Result<ExitCode> {
    if let Command::List { json } = command {
        return list(&config, json);
    }

    let mut controller = Controller::open(config)
        .await
        .context("Failed to open controller")?;

    let result = match command {
        Command::Discover { .. } => discover(&mut controller).await,
        Command::Run {
            pattern,
            color,
            fps,
            duration,
            speed,
            frequency,
            amplitude,
            no_discovery,
        } => {
            let options = PatternOptions {
                color,
                speed,
                frequency,
                amplitude,
            };
            run(&mut controller, pattern, &options, fps, duration, no_discovery).await
        }
        Command::Off => off(&mut controller).await,
        Command::Blackout { force } => blackout(&mut controller, force).await,
        Command::List { json } => list(controller.config(), json),
    };

    // Always leave the fixtures dark
    controller.close().await;
    result
}

fn print_fixtures(fixtures: &[Fixture]) {
    for fixture in fixtures {
        println!("  - {} at {}", fixture.name(), fixture.address());
        println!("    Pixels: {}", fixture.pixel_count());
        let universes: Vec<String> = fixture
            .allocations()
            .iter()
            .map(|a| a.universe.to_string())
            .collect();
        println!(
            "    Universe: {} (offset {})",
            universes.join(", "),
            fixture.channel_offset()
        );
        println!();
    }
}

fn list(config: &ControllerConfig, json: bool) -> Result<ExitCode> {
    let registry = FixtureRegistry::from_config(&config.fixtures, config.network.artnet_port)?;

    if json {
        println!("{}", serde_json::to_string_pretty(registry.all())?);
        return Ok(ExitCode::SUCCESS);
    }

    if registry.is_empty() {
        println!("No fixtures configured.");
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "{} fixtures, {} pixels:",
        registry.len(),
        registry.total_pixel_count()
    );
    print_fixtures(registry.all());
    Ok(ExitCode::SUCCESS)
}

async fn discover(controller: &mut Controller) -> Result<ExitCode> {
    println!(
        "Discovering {} fixtures...",
        controller.config().discovery.protocol
    );
    let fixtures = controller.discover(None).await?;

    if fixtures.is_empty() {
        println!("No fixtures found.");
        return Ok(ExitCode::SUCCESS);
    }

    println!("\nFound {} fixtures:", fixtures.len());
    print_fixtures(&fixtures);
    Ok(ExitCode::SUCCESS)
}

/// Discover when nothing is configured yet
async fn ensure_fixtures(controller: &mut Controller) -> Result<()> {
    if controller.registry().is_empty() {
        println!("Discovering fixtures...");
        controller.discover(None).await?;
    }
    Ok(())
}

async fn run(
    controller: &mut Controller,
    kind: PatternKind,
    options: &PatternOptions,
    fps: Option<f64>,
    duration: Option<f64>,
    no_discovery: bool,
) -> Result<ExitCode> {
    if no_discovery {
        println!("Skipping discovery - using configured fixtures only");
        if controller.registry().is_empty() {
            println!("No fixtures configured. Add [[fixtures]] entries to the config file.");
            return Ok(ExitCode::FAILURE);
        }
    } else {
        ensure_fixtures(controller).await?;
    }

    if controller.registry().is_empty() {
        println!("No fixtures found. Cannot run pattern.");
        return Ok(ExitCode::FAILURE);
    }

    let show = &controller.config().show;
    let fps = fps.unwrap_or(show.fps);
    tick_interval(fps).context("Invalid frame rate")?;
    let duration = match duration {
        Some(secs) => Some(run_duration(secs)?),
        None => show.duration(),
    };

    println!("Running {} pattern...", kind);
    println!("  Color: {}", options.color);
    println!("  FPS: {}", fps);
    match duration {
        Some(d) => println!("  Duration: {:.1} seconds", d.as_secs_f64()),
        None => println!("  Duration: indefinite (press Ctrl+C to stop)"),
    }

    let mut pattern = create_pattern(kind, controller.registry().total_pixel_count(), options);
    let run_options = RunOptions { fps, duration };

    let cancel = controller.cancel_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopped by user");
            cancel.cancel();
        }
    });

    let mut progress = ProgressReport::new(fps);
    let summary = controller
        .run(pattern.as_mut(), run_options, Some(&mut progress))
        .await;
    ctrl_c.abort();
    let summary = summary?;

    println!(
        "Sent {} frames in {:.1}s ({})",
        summary.frames,
        summary.elapsed.as_secs_f64(),
        match summary.outcome {
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
        }
    );
    if summary.failed_sends > 0 {
        println!("  {} packets could not be sent", summary.failed_sends);
    }
    Ok(ExitCode::SUCCESS)
}

async fn off(controller: &mut Controller) -> Result<ExitCode> {
    ensure_fixtures(controller).await?;
    println!("Turning off all fixtures...");
    let report = controller.stop_all_fixtures().await?;
    if !report.is_clean() {
        println!("{} fixtures did not accept the packet", report.failures.len());
        return Ok(ExitCode::FAILURE);
    }
    println!("All fixtures turned off.");
    Ok(ExitCode::SUCCESS)
}

async fn blackout(controller: &mut Controller, force: bool) -> Result<ExitCode> {
    println!("EMERGENCY BLACKOUT");
    ensure_fixtures(controller).await?;

    if controller.registry().is_empty() {
        if !force {
            println!("No fixtures found. Use --force to blackout anyway.");
            return Ok(ExitCode::FAILURE);
        }
        println!("Blackout complete - no fixtures found");
        return Ok(ExitCode::SUCCESS);
    }

    let mut failed = 0;
    for _ in 0..BLACKOUT_REPEATS {
        let report = controller.stop_all_fixtures().await?;
        failed = report.failures.len();
    }
    if failed > 0 {
        warn!("{} packets failed in the last blackout round", failed);
    }

    println!(
        "Blackout complete - {} fixtures turned off",
        controller.registry().len()
    );
    Ok(ExitCode::SUCCESS)
}

/// Logs fixtures that start or stop failing, and a heartbeat once per second
struct ProgressReport {
    failing: HashSet<SocketAddr>,
    heartbeat: u64,
}

impl ProgressReport {
    fn new(fps: f64) -> Self {
        Self {
            failing: HashSet::new(),
            heartbeat: fps.round().max(1.0) as u64,
        }
    }
}

impl FrameObserver for ProgressReport {
    fn on_frame(&mut self, event: &FrameEvent<'_>) -> anyhow::Result<()> {
        let failing: HashSet<SocketAddr> =
            event.report.failures.iter().map(|f| f.address).collect();

        for address in failing.difference(&self.failing) {
            warn!("Fixture {} stopped accepting packets", address);
        }
        for address in self.failing.difference(&failing) {
            info!("Fixture {} is reachable again", address);
        }
        self.failing = failing;

        if event.index % self.heartbeat == 0 {
            let lit = event.frame.iter().filter(|p| **p != Rgb::BLACK).count();
            debug!(
                "Frame {}: {} packets, {}/{} pixels lit",
                event.index,
                event.report.packets_sent,
                lit,
                event.frame.len()
            );
        }
        Ok(())
    }
}

/// `--duration` in seconds, which must fit a `Duration`
fn run_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("Duration must be a non-negative number of seconds, got {}", secs))
}
