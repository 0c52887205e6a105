//! Fixture discovery over UDP broadcast

use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::dmx::{decode_discovery_reply, DiscoveryProtocol};
use crate::fixture::{Fixture, FixtureDescriptor, FixtureRegistry};
use crate::transport::Transport;
use crate::Result;

/// Largest reply we accept; ArtPollReply is 239 bytes, WLED info is small JSON
const MAX_REPLY_SIZE: usize = 2048;

/// Pause after a failed receive so a persistently broken socket doesn't spin
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Stand-in deadline for timeouts too long to add to `Instant::now()`
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Broadcasts a discovery probe and registers whatever answers in time
pub struct DiscoveryService<T> {
    transport: T,
    protocol: DiscoveryProtocol,
    probe_port: u16,
    broadcast: IpAddr,
    artnet_port: u16,
}

impl<T: Transport> DiscoveryService<T> {
    /// Create a discovery service on its own transport
    ///
    /// # Arguments
    /// * `transport` - Socket used for the probe and for replies
    /// * `config` - Dialect, probe port and broadcast address
    /// * `artnet_port` - Port discovered fixtures are driven at
    pub fn new(transport: T, config: &DiscoveryConfig, artnet_port: u16) -> Self {
        Self {
            transport,
            protocol: config.protocol,
            probe_port: config.probe_port(),
            broadcast: config.broadcast_address,
            artnet_port,
        }
    }

    pub fn protocol(&self) -> DiscoveryProtocol {
        self.protocol
    }

    /// Broadcast a probe and collect replies until `timeout` elapses.
    ///
    /// Finding nothing is not an error. Each fixture appears once in the result,
    /// in the order its first reply arrived.
    pub async fn discover(
        &self,
        registry: &mut FixtureRegistry,
        timeout: Duration,
    ) -> Result<Vec<Fixture>> {
        info!(
            "Starting {} discovery on {}:{} ({:?} timeout)",
            self.protocol, self.broadcast, self.probe_port, timeout
        );

        let target = SocketAddr::new(self.broadcast, self.probe_port);
        self.transport.send_to(&self.protocol.probe(), target).await?;

        let found = self.collect(registry, timeout, None).await;
        if found.is_empty() {
            warn!("No fixtures answered {} discovery", self.protocol);
        } else {
            info!("Discovered {} fixtures", found.len());
        }
        Ok(found)
    }

    /// Probe a single host and wait for its reply
    pub async fn discover_at(
        &self,
        registry: &mut FixtureRegistry,
        ip: IpAddr,
        timeout: Duration,
    ) -> Result<Option<Fixture>> {
        let target = SocketAddr::new(ip, self.probe_port);
        self.transport.send_to(&self.protocol.probe(), target).await?;

        Ok(self.collect(registry, timeout, Some(ip)).await.pop())
    }

    async fn collect(
        &self,
        registry: &mut FixtureRegistry,
        timeout: Duration,
        only_from: Option<IpAddr>,
    ) -> Vec<Fixture> {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
        let mut buf = [0u8; MAX_REPLY_SIZE];
        let mut recv_errors = 0u32;
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let (len, from) = match self.transport.recv_from(&mut buf, remaining).await {
                Ok(Some(received)) => received,
                Ok(None) => break,
                Err(e) => {
                    recv_errors = recv_errors.saturating_add(1);
                    if recv_errors == 1 {
                        warn!("Error receiving discovery reply: {}", e);
                    } else {
                        debug!(
                            "Error receiving discovery reply ({} so far): {}",
                            recv_errors, e
                        );
                    }
                    tokio::time::sleep(RECV_ERROR_BACKOFF.min(remaining)).await;
                    continue;
                }
            };

            if only_from.is_some_and(|ip| ip != from.ip()) {
                debug!("Ignoring reply from {} while probing {:?}", from, only_from);
                continue;
            }

            let Some(info) = decode_discovery_reply(&buf[..len]) else {
                debug!("Ignoring foreign datagram from {}", from);
                continue;
            };

            let address = SocketAddr::new(from.ip(), self.artnet_port);
            let descriptor = FixtureDescriptor::new(address, info);
            match registry.add_discovered(descriptor) {
                Ok(fixture) => {
                    if seen.insert(address) {
                        info!(
                            "Discovered {} at {} ({} pixels)",
                            fixture.name(),
                            address,
                            fixture.pixel_count()
                        );
                        found.push(fixture.clone());
                    }
                }
                Err(e) => warn!("Could not register fixture at {}: {}", address, e),
            }

            if only_from.is_some() && !found.is_empty() {
                break;
            }
        }

        found
    }
}
