//! Remote connection state

use std::net::SocketAddr;
use std::time::Instant;

/// Connect id, unique for the lifetime of the owning endpoint.
pub type PeerId = u64;

/// A remote connection known to one endpoint.
///
/// Created on connect-accept, destroyed on disconnect. Never shared across
/// endpoints.
#[derive(Debug, Clone)]
pub struct Peer {
    id: PeerId,
    addr: SocketAddr,
    latency_ms: u32,
    pub(crate) last_seen: Instant,
    pub(crate) last_ping: Instant,
}

impl Peer {
    pub(crate) fn new(id: PeerId, addr: SocketAddr) -> Self {
        let now = Instant::now();
        Self {
            id,
            addr,
            latency_ms: 0,
            last_seen: now,
            last_ping: now,
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Half round-trip time from the last pong, in milliseconds.
    pub fn latency_ms(&self) -> u32 {
        self.latency_ms
    }

    pub(crate) fn set_latency_ms(&mut self, latency_ms: u32) {
        self.latency_ms = latency_ms;
    }

    pub(crate) fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}
