//! Shared test helpers: a scripted in-memory transport and simple patterns

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use ledflow_core::{ArtDmx, Frame, PatternSource, Transport};

/// Records every datagram and replays scripted replies
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    failing: Mutex<HashSet<SocketAddr>>,
    replies: Mutex<VecDeque<(Vec<u8>, SocketAddr)>>,
    /// Per-send delays, used in turn and repeated
    send_delays: Vec<Duration>,
    sends: AtomicUsize,
    failing_receives: AtomicUsize,
    recv_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `n` takes `delays[n % delays.len()]` of (virtual) time
    pub fn with_send_delays(delays: Vec<Duration>) -> Self {
        Self {
            send_delays: delays,
            ..Self::default()
        }
    }

    /// The next `count` receives fail immediately
    pub fn fail_receives(&self, count: usize) {
        self.failing_receives.store(count, Ordering::SeqCst);
    }

    pub fn recv_calls(&self) -> usize {
        self.recv_calls.load(Ordering::SeqCst)
    }

    pub fn fail_sends_to(&self, address: SocketAddr) {
        self.failing.lock().unwrap().insert(address);
    }

    pub fn push_reply(&self, datagram: &[u8], from: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back((datagram.to_vec(), from.parse().unwrap()));
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.lock().unwrap().clone()
    }

    /// Decoded ArtDmx packets sent to `address`
    pub fn dmx_sent_to(&self, address: SocketAddr) -> Vec<ArtDmx> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| *to == address)
            .filter_map(|(_, datagram)| ArtDmx::parse(&datagram))
            .collect()
    }
}

impl Transport for MockTransport {
    async fn send_to(&self, datagram: &[u8], target: SocketAddr) -> io::Result<usize> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst);
        if !self.send_delays.is_empty() {
            let delay = self.send_delays[n % self.send_delays.len()];
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        if self.failing.lock().unwrap().contains(&target) {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "simulated socket error",
            ));
        }
        self.sent.lock().unwrap().push((target, datagram.to_vec()));
        Ok(datagram.len())
    }

    async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> io::Result<Option<(usize, SocketAddr)>> {
        self.recv_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_receives
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated receive error",
            ));
        }

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some((datagram, from)) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some((datagram.len(), from)))
            }
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

/// Returns the same frame every tick and counts steps
pub struct FixedPattern {
    pub frame: Frame,
    pub step: u64,
}

impl FixedPattern {
    pub fn new(frame: Frame) -> Self {
        Self { frame, step: 0 }
    }
}

impl PatternSource for FixedPattern {
    fn generate_frame(&self) -> Frame {
        self.frame.clone()
    }

    fn advance(&mut self) {
        self.step += 1;
    }

    fn reset(&mut self) {
        self.step = 0;
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

pub fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}
