//! UDP transmission channel
//!
//! [`Transport`] is the seam between the engine and the network. The scheduler
//! and discovery service are generic over it so they can be driven by the real
//! [`UdpTransport`] or by an in-memory stand-in.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::Result;

/// Datagram send/receive capability
pub trait Transport {
    /// Send one datagram. Implementations must give up after a bounded time.
    fn send_to(
        &self,
        datagram: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send;

    /// Wait up to `timeout` for one datagram. `Ok(None)` means nothing arrived.
    fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Option<(usize, SocketAddr)>>> + Send;
}

impl<T: Transport + Send + Sync> Transport for Arc<T> {
    fn send_to(
        &self,
        datagram: &[u8],
        target: SocketAddr,
    ) -> impl Future<Output = io::Result<usize>> + Send {
        (**self).send_to(datagram, target)
    }

    fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Option<(usize, SocketAddr)>>> + Send {
        (**self).recv_from(buf, timeout)
    }
}

/// Broadcast-enabled UDP socket with a per-send timeout
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    send_timeout: Duration,
}

impl UdpTransport {
    /// Bind a socket and enable broadcast
    ///
    /// # Arguments
    /// * `bind_address` - Local address, typically "0.0.0.0:0"
    /// * `send_timeout` - Upper bound for a single send
    pub async fn bind(bind_address: SocketAddr, send_timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind(bind_address).await?;
        socket.set_broadcast(true)?;

        tracing::debug!("UDP transport bound to {}", socket.local_addr()?);

        Ok(Self {
            socket,
            send_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        match tokio::time::timeout(self.send_timeout, self.socket.send_to(datagram, target)).await
        {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("send to {} timed out after {:?}", target, self.send_timeout),
            )),
        }
    }

    async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.socket.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}
