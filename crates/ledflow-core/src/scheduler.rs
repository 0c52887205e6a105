//! Fixed-rate frame loop
//!
//! [`FrameScheduler::run`] pulls one frame per tick from a [`PatternSource`],
//! slices it per fixture, encodes every universe and sends it. Ticks are laid on
//! an absolute grid (`start + n * interval`) so that a slow tick shortens the
//! following sleep instead of shifting every later frame.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::dmx::ArtNetCodec;
use crate::error::ControlError;
use crate::fixture::{FixtureRegistry, FixtureSlice};
use crate::pattern::{PatternSource, Rgb};
use crate::transport::Transport;
use crate::Result;

/// Lifecycle of the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// How a run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The requested duration elapsed
    Completed,
    /// [`CancelHandle::cancel`] was called
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    pub fps: f64,
    /// Stop after this much wall-clock time, run until cancelled when `None`
    pub duration: Option<Duration>,
}

impl RunOptions {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub frames: u64,
    pub failed_sends: u64,
    pub elapsed: Duration,
}

/// A packet that could not be delivered
#[derive(Debug)]
pub struct TransmissionFailure {
    pub address: SocketAddr,
    pub universe: u16,
    pub error: ControlError,
}

/// Per-tick delivery result
#[derive(Debug, Default)]
pub struct TickReport {
    pub packets_sent: usize,
    pub failures: Vec<TransmissionFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Everything an observer gets to see after a tick
#[derive(Debug)]
pub struct FrameEvent<'a> {
    /// 0-based tick number within the run
    pub index: u64,
    pub frame: &'a [Rgb],
    pub slices: &'a [FixtureSlice<'a>],
    pub report: &'a TickReport,
}

/// Tick length for `fps`.
///
/// Rates whose period is not a positive, representable [`Duration`] are rejected.
pub fn tick_interval(fps: f64) -> Result<Duration> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(ControlError::InvalidParameter(format!(
            "fps must be positive, got {}",
            fps
        )));
    }
    match Duration::try_from_secs_f64(1.0 / fps) {
        Ok(interval) if !interval.is_zero() => Ok(interval),
        _ => Err(ControlError::InvalidParameter(format!(
            "fps {} has no usable tick interval",
            fps
        ))),
    }
}

/// Per-frame callback. Errors are logged and never stop the loop.
pub trait FrameObserver {
    fn on_frame(&mut self, event: &FrameEvent<'_>) -> anyhow::Result<()>;
}

/// Requests a running loop to stop at its next tick boundary
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Drives a pattern onto the registered fixtures
pub struct FrameScheduler<T> {
    transport: T,
    codec: ArtNetCodec,
    state: watch::Sender<SchedulerState>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl<T: Transport> FrameScheduler<T> {
    pub fn new(transport: T) -> Self {
        Self::with_codec(transport, ArtNetCodec::new())
    }

    pub fn with_codec(transport: T, codec: ArtNetCodec) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            transport,
            codec,
            state,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn set_state(&self, state: SchedulerState) {
        self.state.send_replace(state);
    }

    /// Run `pattern` until `options.duration` elapses or the loop is cancelled.
    ///
    /// A frame of the wrong length is fatal: the state becomes
    /// [`SchedulerState::Failed`] and fixtures keep their last output.
    /// Send failures are reported to the observer and never end the run.
    pub async fn run<P>(
        &mut self,
        registry: &FixtureRegistry,
        pattern: &mut P,
        options: RunOptions,
        mut observer: Option<&mut dyn FrameObserver>,
    ) -> Result<RunSummary>
    where
        P: PatternSource + ?Sized,
    {
        let interval = tick_interval(options.fps)?;
        if registry.is_empty() {
            error!("No fixtures available. Discover or add fixtures first.");
            return Err(ControlError::NoFixtures);
        }

        let expected = registry.total_pixel_count();

        // A cancel issued before this run belongs to the previous one
        self.cancel_tx.send_replace(false);
        self.cancel_rx.borrow_and_update();
        self.set_state(SchedulerState::Running);
        info!(
            "Starting pattern: {} at {} FPS on {} fixtures",
            pattern.name(),
            options.fps,
            registry.len()
        );

        let start = Instant::now();
        let mut next_tick = start;
        let mut frames = 0u64;
        let mut failed_sends = 0u64;

        let outcome = loop {
            if *self.cancel_rx.borrow_and_update() {
                break RunOutcome::Cancelled;
            }
            if options.duration.is_some_and(|d| start.elapsed() >= d) {
                break RunOutcome::Completed;
            }

            let frame = pattern.generate_frame();
            if frame.len() != expected {
                self.set_state(SchedulerState::Failed);
                error!(
                    "Pattern {} produced {} pixels, expected {}",
                    pattern.name(),
                    frame.len(),
                    expected
                );
                return Err(ControlError::FrameLength {
                    expected,
                    actual: frame.len(),
                });
            }

            let slices = registry.slices(&frame)?;
            let report = self.transmit(&slices).await;
            failed_sends += report.failures.len() as u64;
            pattern.advance();

            if let Some(observer) = observer.as_mut() {
                let event = FrameEvent {
                    index: frames,
                    frame: &frame,
                    slices: &slices,
                    report: &report,
                };
                if let Err(e) = observer.on_frame(&event) {
                    warn!("Frame observer failed on frame {}: {:#}", frames, e);
                }
            }
            frames += 1;

            next_tick += interval;
            tokio::select! {
                _ = sleep_until(next_tick) => {}
                _ = self.cancel_rx.changed() => {}
            }
        };

        let summary = RunSummary {
            outcome,
            frames,
            failed_sends,
            elapsed: start.elapsed(),
        };
        self.set_state(match outcome {
            RunOutcome::Completed => SchedulerState::Completed,
            RunOutcome::Cancelled => SchedulerState::Cancelled,
        });
        info!(
            "Pattern finished ({:?}). Sent {} frames in {:.2?}",
            outcome, summary.frames, summary.elapsed
        );

        Ok(summary)
    }

    /// Send black to every fixture once, through the same path as a running show
    pub async fn stop_all_fixtures(&mut self, registry: &FixtureRegistry) -> Result<TickReport> {
        let frame = vec![Rgb::BLACK; registry.total_pixel_count()];
        let slices = registry.slices(&frame)?;
        let report = self.transmit(&slices).await;

        if report.is_clean() {
            info!("Turned off all fixtures");
        } else {
            warn!(
                "Turned off fixtures with {} failed packets",
                report.failures.len()
            );
        }
        Ok(report)
    }

    /// Encode and send every universe of every fixture, in registration order
    async fn transmit(&mut self, slices: &[FixtureSlice<'_>]) -> TickReport {
        let mut report = TickReport::default();

        for slice in slices {
            let address = slice.fixture.address();
            for allocation in slice.fixture.allocations() {
                let universe = allocation.universe;
                let data = allocation.channel_data(slice.pixels);

                let result = match self.codec.encode(universe, &data) {
                    Ok(packet) => self
                        .transport
                        .send_to(&packet, address)
                        .await
                        .map_err(|source| ControlError::Transmission {
                            address,
                            universe,
                            source,
                        }),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(_) => report.packets_sent += 1,
                    Err(error) => {
                        warn!(
                            "Failed to send Art-Net to {} (universe {}): {}",
                            address, universe, error
                        );
                        report.failures.push(TransmissionFailure {
                            address,
                            universe,
                            error,
                        });
                    }
                }
            }
        }

        debug!(
            "Sent {} packets, {} failed",
            report.packets_sent,
            report.failures.len()
        );
        report
    }
}
