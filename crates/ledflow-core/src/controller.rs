//! Controller handle tying the registry, discovery and frame loop together
//!
//! ```rust,no_run
//! use ledflow_core::{Controller, ControllerConfig, RunOptions};
//! # use ledflow_core::{Frame, PatternSource, Rgb};
//! # struct Solid(usize);
//! # impl PatternSource for Solid {
//! #     fn generate_frame(&self) -> Frame { vec![Rgb::RED; self.0] }
//! #     fn advance(&mut self) {}
//! #     fn reset(&mut self) {}
//! # }
//!
//! # async fn show() -> ledflow_core::Result<()> {
//! let mut controller = Controller::open(ControllerConfig::default()).await?;
//! controller.discover(None).await?;
//!
//! let mut pattern = Solid(controller.registry().total_pixel_count());
//! controller
//!     .run(&mut pattern, RunOptions::new(30.0), None)
//!     .await?;
//!
//! // Sends black to every fixture before releasing the socket
//! controller.close().await;
//! # Ok(())
//! # }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ControllerConfig;
use crate::discovery::DiscoveryService;
use crate::fixture::{Fixture, FixtureRegistry};
use crate::pattern::PatternSource;
use crate::scheduler::{
    CancelHandle, FrameObserver, FrameScheduler, RunOptions, RunSummary, SchedulerState,
    TickReport,
};
use crate::transport::{Transport, UdpTransport};
use crate::Result;

/// Explicitly opened and closed controller context
pub struct Controller<T: Transport = UdpTransport> {
    config: ControllerConfig,
    registry: FixtureRegistry,
    scheduler: FrameScheduler<T>,
    closed: bool,
}

impl Controller<UdpTransport> {
    /// Bind the output socket and register the fixtures listed in `config`
    pub async fn open(config: ControllerConfig) -> Result<Self> {
        config.validate()?;
        let transport =
            UdpTransport::bind(config.network.bind_address, config.network.send_timeout()).await?;
        Self::with_transport(transport, config)
    }
}

impl<T: Transport> Controller<T> {
    /// Build a controller around an existing transport
    pub fn with_transport(transport: T, config: ControllerConfig) -> Result<Self> {
        let registry =
            FixtureRegistry::from_config(&config.fixtures, config.network.artnet_port)?;

        info!("Controller opened with {} configured fixtures", registry.len());

        Ok(Self {
            config,
            registry,
            scheduler: FrameScheduler::new(transport),
            closed: false,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    /// Mutable registry access; unavailable while a show is running
    pub fn registry_mut(&mut self) -> &mut FixtureRegistry {
        &mut self.registry
    }

    pub fn add_manual(
        &mut self,
        address: SocketAddr,
        pixel_count: usize,
        name: Option<&str>,
    ) -> Result<&Fixture> {
        self.registry.add_manual(address, pixel_count, name)
    }

    pub fn remove(&mut self, address: SocketAddr) -> Option<Fixture> {
        self.registry.remove(address)
    }

    /// Run discovery on a fresh socket, `timeout` defaults to the configured one
    pub async fn discover(&mut self, timeout: Option<Duration>) -> Result<Vec<Fixture>> {
        let service = self.discovery_service().await?;
        let timeout = timeout.unwrap_or_else(|| self.config.discovery.timeout());
        service.discover(&mut self.registry, timeout).await
    }

    /// Probe a single host
    pub async fn discover_at(
        &mut self,
        ip: IpAddr,
        timeout: Option<Duration>,
    ) -> Result<Option<Fixture>> {
        let service = self.discovery_service().await?;
        let timeout = timeout.unwrap_or_else(|| self.config.discovery.timeout());
        service.discover_at(&mut self.registry, ip, timeout).await
    }

    async fn discovery_service(&self) -> Result<DiscoveryService<UdpTransport>> {
        let discovery = &self.config.discovery;
        let transport =
            UdpTransport::bind(discovery.bind_address(), self.config.network.send_timeout())
                .await?;
        Ok(DiscoveryService::new(
            transport,
            discovery,
            self.config.network.artnet_port,
        ))
    }

    /// Run discovery with a caller-provided transport
    pub async fn discover_with<D: Transport>(
        &mut self,
        transport: D,
        timeout: Duration,
    ) -> Result<Vec<Fixture>> {
        let service = DiscoveryService::new(
            transport,
            &self.config.discovery,
            self.config.network.artnet_port,
        );
        service.discover(&mut self.registry, timeout).await
    }

    /// Run a pattern on all fixtures. See [`FrameScheduler::run`].
    pub async fn run<P>(
        &mut self,
        pattern: &mut P,
        options: RunOptions,
        observer: Option<&mut dyn FrameObserver>,
    ) -> Result<RunSummary>
    where
        P: PatternSource + ?Sized,
    {
        self.scheduler
            .run(&self.registry, pattern, options, observer)
            .await
    }

    /// Send black to every fixture once
    pub async fn stop_all_fixtures(&mut self) -> Result<TickReport> {
        self.scheduler.stop_all_fixtures(&self.registry).await
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.scheduler.cancel_handle()
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.scheduler.subscribe()
    }

    pub fn transport(&self) -> &T {
        self.scheduler.transport()
    }

    /// Turn all fixtures off, then release the socket.
    ///
    /// A failed all-off is logged, not returned.
    pub async fn close(mut self) {
        if !self.registry.is_empty() {
            match self.scheduler.stop_all_fixtures(&self.registry).await {
                Ok(report) if !report.is_clean() => warn!(
                    "{} fixtures could not be turned off on close",
                    report.failures.len()
                ),
                Ok(_) => {}
                Err(e) => warn!("Failed to turn off fixtures on close: {}", e),
            }
        }
        self.closed = true;
        info!("Controller closed");
    }
}

impl<T: Transport> Drop for Controller<T> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("Controller dropped without close(); fixtures keep their last output");
        }
    }
}
