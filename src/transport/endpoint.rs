//! UDP endpoint with a cooperative poll-driven lifecycle
//!
//! One endpoint per role (server or client). Non-blocking socket, readiness
//! checked through mio with a zero timeout, so `poll_events` never blocks:
//! it drains every queued datagram, runs timers, flushes outgoing traffic
//! and dispatches the resulting callbacks synchronously before returning.
//!
//! Reliability, ordering and fragmentation are deliberately absent; lost
//! datagrams stay lost.

use std::io;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use mio::net::UdpSocket;
use mio::{Events, Interest, Poll, Token};

use crate::protocol::{
    DataWriter, DisconnectReason, Packet, PacketKind, UnconnectedKind, HEADER_SIZE,
    MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE,
};

use super::event::{Event as NetEvent, EventListener};
use super::peer::{Peer, PeerId};

const SOCKET_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 64;
const RECV_BUFFER_SIZE: usize = 64 * 1024;

const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(1);
/// A peer silent for longer than this is dropped with `Timeout`.
const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);
/// An unanswered connect request is abandoned after this long. Requests are
/// never retransmitted.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint lifecycle. `Stopped` is terminal; a failed bind falls back to
/// `Idle` so the failure can be reported without consuming the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Idle,
    Starting,
    Running,
    Stopped,
}

/// Traffic totals for one endpoint. Monotonically non-decreasing; mutated
/// only by the endpoint's own socket paths, read by value snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub bytes_sent: u64,
    pub packets_sent: u64,
    pub bytes_received: u64,
    pub packets_received: u64,
}

/// Connect request awaiting an accept. Fire-and-forget: no retry, only a
/// timeout that surfaces as `ConnectionFailed`.
struct PendingConnect {
    nonce: u64,
    addr: SocketAddr,
    local_id: PeerId,
    sent_at: Instant,
}

/// Role-neutral transport actor owning one UDP socket, a peer table and
/// traffic counters.
pub struct Endpoint {
    state: EndpointState,
    app_id: String,
    max_peers: usize,
    merge_enabled: bool,
    ping_interval: Duration,
    peer_timeout: Duration,
    connect_timeout: Duration,

    poll: Poll,
    mio_events: Events,
    socket: Option<UdpSocket>,
    local_addr: Option<SocketAddr>,
    recv_buffer: Box<[u8]>,

    peers: Vec<Peer>,
    pending: Vec<PendingConnect>,
    next_peer_id: PeerId,
    counters: Counters,

    /// Outgoing frames held back for coalescing when merge is enabled.
    merge_queue: Vec<(SocketAddr, Vec<u8>)>,
    /// Events staged during state mutation, dispatched at the end of the
    /// poll cycle in arrival order.
    staged: Vec<NetEvent>,
}

impl Endpoint {
    /// Create an endpoint accepting up to `max_peers` connections under the
    /// given application identifier.
    pub fn new(max_peers: usize, app_id: &str) -> io::Result<Self> {
        Ok(Self {
            state: EndpointState::Idle,
            app_id: app_id.to_string(),
            max_peers,
            merge_enabled: false,
            ping_interval: DEFAULT_PING_INTERVAL,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            poll: Poll::new()?,
            mio_events: Events::with_capacity(EVENTS_CAPACITY),
            socket: None,
            local_addr: None,
            recv_buffer: vec![0u8; RECV_BUFFER_SIZE].into_boxed_slice(),
            peers: Vec::new(),
            pending: Vec::new(),
            next_peer_id: 1,
            counters: Counters::default(),
            merge_queue: Vec::new(),
            staged: Vec::new(),
        })
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Counter snapshot. Safe to read at any time; no traffic can occur
    /// after `stop`.
    pub fn counters(&self) -> Counters {
        self.counters
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Currently connected peers, in internal collection order. No ordering
    /// guarantee beyond "all connected peers at call time".
    pub fn connected_peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.id() == id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Hold small outgoing packets back and coalesce them into one datagram
    /// per poll cycle. Trades up to one cycle of latency for fewer datagrams.
    pub fn set_merge_enabled(&mut self, enabled: bool) {
        self.merge_enabled = enabled;
    }

    pub fn merge_enabled(&self) -> bool {
        self.merge_enabled
    }

    /// Keep-alive cadence per peer. Also drives latency updates.
    pub fn set_ping_interval(&mut self, interval: Duration) {
        self.ping_interval = interval;
    }

    /// How long a peer may stay silent before it is dropped with `Timeout`.
    pub fn set_peer_timeout(&mut self, timeout: Duration) {
        self.peer_timeout = timeout;
    }

    /// How long an unanswered connect request waits before it surfaces as
    /// `ConnectionFailed`.
    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    /// Bind the socket. `None` picks an ephemeral port. A bind failure is
    /// non-fatal: the error is returned and the endpoint falls back to Idle.
    pub fn start(&mut self, port: Option<u16>) -> io::Result<()> {
        if self.state != EndpointState::Idle {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "endpoint already started",
            ));
        }
        self.state = EndpointState::Starting;
        match self.bind(port.unwrap_or(0)) {
            Ok(()) => {
                self.state = EndpointState::Running;
                Ok(())
            }
            Err(e) => {
                self.state = EndpointState::Idle;
                Err(e)
            }
        }
    }

    fn bind(&mut self, port: u16) -> io::Result<()> {
        let std_socket = std::net::UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
        std_socket.set_nonblocking(true)?;

        #[cfg(unix)]
        tune_socket_buffers(&std_socket);

        let mut socket = UdpSocket::from_std(std_socket);
        self.poll
            .registry()
            .register(&mut socket, SOCKET_TOKEN, Interest::READABLE)?;
        self.local_addr = Some(socket.local_addr()?);
        self.socket = Some(socket);
        Ok(())
    }

    /// Send one connect request to `host:port`. Fire-and-forget: connection
    /// establishment is observed later via `on_peer_connected`, failure via
    /// `on_peer_disconnected(ConnectionFailed)`. Never retried; repeated
    /// calls for an address already connected or pending are no-ops.
    pub fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        if self.state != EndpointState::Running {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "endpoint not running",
            ));
        }
        let ip: IpAddr = host
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid host address"))?;
        let addr = SocketAddr::new(ip, port);

        // Already connected or already connecting to this address: the call
        // is a no-op. A second pending entry would mature into a spurious
        // ConnectionFailed after the first accept wins.
        if self.peers.iter().any(|p| p.addr() == addr)
            || self.pending.iter().any(|p| p.addr == addr)
        {
            return Ok(());
        }

        let nonce = now_ns();
        let local_id = self.next_peer_id;
        self.next_peer_id += 1;
        self.pending.push(PendingConnect {
            nonce,
            addr,
            local_id,
            sent_at: Instant::now(),
        });

        let request = Packet::ConnectRequest {
            nonce,
            app_id: self.app_id.clone(),
        };
        self.send_packet(addr, &request);
        self.flush_merge_queue();
        Ok(())
    }

    /// Queue application data for a connected peer. With merge enabled the
    /// datagram leaves on the next poll cycle.
    pub fn send(&mut self, peer_id: PeerId, data: &[u8]) -> io::Result<()> {
        if self.state != EndpointState::Running {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "endpoint not running",
            ));
        }
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "payload exceeds max datagram size",
            ));
        }
        let addr = match self.peer(peer_id) {
            Some(peer) => peer.addr(),
            None => {
                return Err(io::Error::new(io::ErrorKind::NotFound, "unknown peer"));
            }
        };
        let packet = Packet::Data {
            payload: data.to_vec(),
        };
        self.send_packet(addr, &packet);
        Ok(())
    }

    /// Send a connectionless message to an arbitrary address.
    pub fn send_unconnected(&mut self, addr: SocketAddr, data: &[u8]) -> io::Result<()> {
        if self.state != EndpointState::Running {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "endpoint not running",
            ));
        }
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "payload exceeds max datagram size",
            ));
        }
        let packet = Packet::Unconnected {
            kind: UnconnectedKind::Basic,
            payload: data.to_vec(),
        };
        self.send_packet(addr, &packet);
        Ok(())
    }

    /// Drop a peer. The remote side is notified best-effort; the local
    /// `on_peer_disconnected(DisconnectCalled)` fires on the next poll.
    pub fn disconnect_peer(&mut self, peer_id: PeerId) {
        if let Some(pos) = self.peers.iter().position(|p| p.id() == peer_id) {
            let peer = self.peers.remove(pos);
            let notice = Packet::Disconnect {
                reason: DisconnectReason::RemoteClose,
            };
            self.send_packet(peer.addr(), &notice);
            self.flush_merge_queue();
            self.staged
                .push(NetEvent::PeerDisconnected(peer, DisconnectReason::DisconnectCalled));
        }
    }

    /// One poll cycle: drain every queued inbound datagram, run timers,
    /// flush outgoing traffic, then dispatch all staged events to the
    /// listener in arrival order. Never blocks. A no-op unless Running.
    pub fn poll_events(&mut self, listener: &mut dyn EventListener) -> io::Result<()> {
        if self.state != EndpointState::Running {
            return Ok(());
        }

        match Poll::poll(&mut self.poll, &mut self.mio_events, Some(Duration::ZERO)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
        if !self.mio_events.is_empty() {
            self.drain_socket();
        }
        self.service_timers();
        self.flush_merge_queue();

        let events = mem::take(&mut self.staged);
        self.dispatch(listener, events);
        Ok(())
    }

    /// Release the socket and notify peers best-effort. Terminal: a stopped
    /// endpoint cannot be restarted and its counters never change again.
    pub fn stop(&mut self) {
        if self.state == EndpointState::Running {
            self.flush_merge_queue();
            let notice = Packet::Disconnect {
                reason: DisconnectReason::RemoteClose,
            }
            .to_bytes();
            let addrs: Vec<SocketAddr> = self.peers.iter().map(|p| p.addr()).collect();
            for addr in addrs {
                self.send_datagram(addr, &notice);
            }
        }
        self.peers.clear();
        self.pending.clear();
        self.staged.clear();
        self.merge_queue.clear();
        if let Some(mut socket) = self.socket.take() {
            let _ = self.poll.registry().deregister(&mut socket);
        }
        self.state = EndpointState::Stopped;
    }

    // ---- inbound path -------------------------------------------------

    fn drain_socket(&mut self) {
        loop {
            let recv = match self.socket.as_ref() {
                Some(socket) => socket.recv_from(&mut self.recv_buffer),
                None => return,
            };
            match recv {
                Ok((len, src)) => {
                    self.counters.bytes_received += len as u64;
                    self.counters.packets_received += 1;
                    // Copy out so the scratch buffer is free for the next recv
                    let datagram = self.recv_buffer[..len].to_vec();
                    self.handle_datagram(src, &datagram);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    let addr = self
                        .local_addr
                        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
                    self.staged
                        .push(NetEvent::NetworkError(addr, e.raw_os_error().unwrap_or(-1)));
                    return;
                }
            }
        }
    }

    fn handle_datagram(&mut self, src: SocketAddr, datagram: &[u8]) {
        let packet = match Packet::decode(datagram) {
            Some(p) => p,
            None => return, // garbage is dropped silently
        };
        if let Packet::Merged { frames } = packet {
            for frame in frames {
                match Packet::decode(&frame) {
                    // one level only, merged-in-merged is dropped
                    Some(p) if p.kind() != PacketKind::Merged => self.handle_packet(src, p),
                    _ => {}
                }
            }
        } else {
            self.handle_packet(src, packet);
        }
    }

    fn handle_packet(&mut self, src: SocketAddr, packet: Packet) {
        match packet {
            Packet::ConnectRequest { nonce, app_id } => {
                self.handle_connect_request(src, nonce, &app_id);
            }
            Packet::ConnectAccept { nonce, peer_id: _ } => {
                self.handle_connect_accept(src, nonce);
            }
            Packet::ConnectReject { reason } => {
                if let Some(pos) = self.pending.iter().position(|p| p.addr == src) {
                    let pending = self.pending.remove(pos);
                    let peer = Peer::new(pending.local_id, src);
                    self.staged.push(NetEvent::PeerDisconnected(peer, reason));
                }
            }
            Packet::Disconnect { reason } => {
                if let Some(pos) = self.peers.iter().position(|p| p.addr() == src) {
                    let peer = self.peers.remove(pos);
                    self.staged.push(NetEvent::PeerDisconnected(peer, reason));
                }
            }
            Packet::Ping { token } => {
                if self.touch_peer(src) {
                    self.send_packet(src, &Packet::Pong { token });
                }
            }
            Packet::Pong { token } => {
                let rtt_ns = now_ns().saturating_sub(token);
                let latency_ms = (rtt_ns / 2 / 1_000_000) as u32;
                if let Some(peer) = self.peers.iter_mut().find(|p| p.addr() == src) {
                    peer.touch();
                    peer.set_latency_ms(latency_ms);
                    let id = peer.id();
                    self.staged.push(NetEvent::LatencyUpdate(id, latency_ms));
                }
            }
            Packet::Data { payload } => {
                if let Some(peer) = self.peers.iter_mut().find(|p| p.addr() == src) {
                    peer.touch();
                    let id = peer.id();
                    self.staged.push(NetEvent::Receive(id, payload));
                }
                // data from unknown addresses is dropped
            }
            Packet::Unconnected { kind, payload } => {
                self.staged
                    .push(NetEvent::ReceiveUnconnected(src, payload, kind));
            }
            Packet::Merged { .. } => {} // flattened in handle_datagram
        }
    }

    fn handle_connect_request(&mut self, src: SocketAddr, nonce: u64, app_id: &str) {
        if app_id != self.app_id {
            self.send_packet(
                src,
                &Packet::ConnectReject {
                    reason: DisconnectReason::Rejected,
                },
            );
            return;
        }
        // Duplicate request from an already connected peer: re-accept
        // idempotently, the original accept datagram may have been lost.
        if let Some(peer) = self.peers.iter().find(|p| p.addr() == src) {
            let peer_id = peer.id();
            self.send_packet(src, &Packet::ConnectAccept { nonce, peer_id });
            return;
        }
        if self.peers.len() >= self.max_peers {
            self.send_packet(
                src,
                &Packet::ConnectReject {
                    reason: DisconnectReason::Rejected,
                },
            );
            return;
        }
        let peer_id = self.next_peer_id;
        self.next_peer_id += 1;
        self.peers.push(Peer::new(peer_id, src));
        self.send_packet(src, &Packet::ConnectAccept { nonce, peer_id });
        self.staged.push(NetEvent::PeerConnected(peer_id));
    }

    /// The accept's echoed id is the acceptor's; the local table is keyed by
    /// the id allocated at connect time, so ids stay unique on this endpoint
    /// even when it is connected to several remotes.
    fn handle_connect_accept(&mut self, src: SocketAddr, nonce: u64) {
        if self.peers.iter().any(|p| p.addr() == src) {
            return; // duplicate accept
        }
        if let Some(pos) = self
            .pending
            .iter()
            .position(|p| p.nonce == nonce && p.addr == src)
        {
            let pending = self.pending.remove(pos);
            self.peers.push(Peer::new(pending.local_id, src));
            self.staged.push(NetEvent::PeerConnected(pending.local_id));
        }
        // stale or unknown nonce: ignored
    }

    fn touch_peer(&mut self, addr: SocketAddr) -> bool {
        match self.peers.iter_mut().find(|p| p.addr() == addr) {
            Some(peer) => {
                peer.touch();
                true
            }
            None => false,
        }
    }

    // ---- timers -------------------------------------------------------

    fn service_timers(&mut self) {
        let now = Instant::now();

        let mut i = 0;
        while i < self.peers.len() {
            if now.duration_since(self.peers[i].last_seen) > self.peer_timeout {
                let peer = self.peers.remove(i);
                self.staged
                    .push(NetEvent::PeerDisconnected(peer, DisconnectReason::Timeout));
            } else {
                i += 1;
            }
        }

        let mut ping_due = Vec::new();
        for peer in &mut self.peers {
            if now.duration_since(peer.last_ping) >= self.ping_interval {
                peer.last_ping = now;
                ping_due.push(peer.addr());
            }
        }
        for addr in ping_due {
            let token = now_ns();
            self.send_packet(addr, &Packet::Ping { token });
        }

        let mut i = 0;
        while i < self.pending.len() {
            if now.duration_since(self.pending[i].sent_at) > self.connect_timeout {
                let pending = self.pending.remove(i);
                let peer = Peer::new(pending.local_id, pending.addr);
                self.staged.push(NetEvent::PeerDisconnected(
                    peer,
                    DisconnectReason::ConnectionFailed,
                ));
            } else {
                i += 1;
            }
        }
    }

    // ---- outbound path ------------------------------------------------

    fn send_packet(&mut self, addr: SocketAddr, packet: &Packet) {
        let bytes = packet.to_bytes();
        if self.merge_enabled
            && self.state == EndpointState::Running
            && bytes.len() + 2 + HEADER_SIZE <= MAX_DATAGRAM_SIZE
        {
            self.merge_queue.push((addr, bytes));
        } else {
            self.send_datagram(addr, &bytes);
        }
    }

    /// Flush held-back frames, coalescing consecutive same-address frames
    /// into one Merged datagram up to the datagram size cap.
    fn flush_merge_queue(&mut self) {
        if self.merge_queue.is_empty() {
            return;
        }
        let queue = mem::take(&mut self.merge_queue);
        let mut i = 0;
        while i < queue.len() {
            let addr = queue[i].0;
            let mut size = HEADER_SIZE;
            let mut j = i;
            while j < queue.len() && queue[j].0 == addr {
                let frame_size = 2 + queue[j].1.len();
                if j > i && size + frame_size > MAX_DATAGRAM_SIZE {
                    break;
                }
                size += frame_size;
                j += 1;
            }
            if j - i == 1 {
                // a lone frame goes out as-is, no merge envelope
                self.send_datagram(addr, &queue[i].1);
            } else {
                let merged = Packet::Merged {
                    frames: queue[i..j].iter().map(|(_, f)| f.clone()).collect(),
                };
                let mut w = DataWriter::with_capacity(size);
                merged.encode(&mut w);
                let bytes = w.as_bytes().to_vec();
                self.send_datagram(addr, &bytes);
            }
            i = j;
        }
    }

    fn send_datagram(&mut self, addr: SocketAddr, buf: &[u8]) {
        let result = match self.socket.as_ref() {
            Some(socket) => socket.send_to(buf, addr),
            None => return,
        };
        match result {
            Ok(n) => {
                self.counters.bytes_sent += n as u64;
                self.counters.packets_sent += 1;
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                // unreliable transport: the datagram is simply lost
            }
            Err(e) => {
                self.staged
                    .push(NetEvent::NetworkError(addr, e.raw_os_error().unwrap_or(-1)));
            }
        }
    }

    // ---- dispatch -----------------------------------------------------

    fn dispatch(&self, listener: &mut dyn EventListener, events: Vec<NetEvent>) {
        for event in events {
            match event {
                NetEvent::PeerConnected(id) => {
                    if let Some(peer) = self.peer(id) {
                        listener.on_peer_connected(self, peer);
                    }
                }
                NetEvent::PeerDisconnected(peer, reason) => {
                    listener.on_peer_disconnected(self, &peer, reason);
                }
                NetEvent::NetworkError(addr, code) => {
                    listener.on_network_error(addr, code);
                }
                NetEvent::Receive(id, data) => {
                    if let Some(peer) = self.peer(id) {
                        listener.on_receive(self, peer, &data);
                    }
                }
                NetEvent::ReceiveUnconnected(addr, data, kind) => {
                    listener.on_receive_unconnected(addr, &data, kind);
                }
                NetEvent::LatencyUpdate(id, latency_ms) => {
                    if let Some(peer) = self.peer(id) {
                        listener.on_latency_update(peer, latency_ms);
                    }
                }
            }
        }
    }
}

/// Wall-clock nanoseconds, used for ping tokens and connect nonces.
#[inline(always)]
fn now_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Bump socket buffers for burst tolerance. Errors ignored, not every
/// platform honors these.
#[cfg(unix)]
fn tune_socket_buffers(socket: &std::net::UdpSocket) {
    use std::os::unix::io::AsRawFd;
    let fd = socket.as_raw_fd();
    unsafe {
        let optval: libc::c_int = 256 * 1024;
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_SNDBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_RCVBUF,
            &optval as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullListener;
    impl EventListener for NullListener {}

    #[test]
    fn test_lifecycle_idle_to_running() {
        let mut ep = Endpoint::new(2, "test").unwrap();
        assert_eq!(ep.state(), EndpointState::Idle);
        ep.start(None).unwrap();
        assert_eq!(ep.state(), EndpointState::Running);
        let addr = ep.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        ep.stop();
        assert_eq!(ep.state(), EndpointState::Stopped);
    }

    #[test]
    fn test_double_start_rejected() {
        let mut ep = Endpoint::new(2, "test").unwrap();
        ep.start(None).unwrap();
        assert!(ep.start(None).is_err());
        ep.stop();
    }

    #[test]
    fn test_bind_failure_returns_to_idle() {
        // occupy a port with a plain socket, then try to bind on top of it
        let blocker = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut ep = Endpoint::new(2, "test").unwrap();
        assert!(ep.start(Some(port)).is_err());
        assert_eq!(ep.state(), EndpointState::Idle);
        assert!(ep.local_addr().is_none());
    }

    #[test]
    fn test_connect_requires_running() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        assert!(ep.connect("127.0.0.1", 9050).is_err());
    }

    #[test]
    fn test_repeat_connect_is_deduplicated() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        ep.connect("127.0.0.1", 9).unwrap();
        let after_first = ep.counters();
        // no second request datagram, no second pending entry
        ep.connect("127.0.0.1", 9).unwrap();
        assert_eq!(ep.counters(), after_first);
        ep.stop();
    }

    #[test]
    fn test_connect_rejects_bad_host() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        assert!(ep.connect("not-an-ip", 9050).is_err());
        ep.stop();
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        assert!(ep.send(42, b"data").is_err());
        ep.stop();
    }

    #[test]
    fn test_poll_after_stop_is_noop() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        ep.stop();
        let before = ep.counters();
        let mut listener = NullListener;
        ep.poll_events(&mut listener).unwrap();
        assert_eq!(ep.counters(), before);
        assert_eq!(ep.state(), EndpointState::Stopped);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        ep.stop();
        assert!(ep.start(None).is_err());
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut ep = Endpoint::new(1, "test").unwrap();
        ep.start(None).unwrap();
        let addr = ep.local_addr().unwrap();
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(ep.send_unconnected(addr, &big).is_err());
        ep.stop();
    }
}
