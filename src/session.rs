//! Server/client demo session
//!
//! One server endpoint, one client endpoint, both owned here and driven by
//! a single cooperative poll loop. The stop signal is checked only between
//! cycles, never mid-poll.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::protocol::{DataReader, DisconnectReason, UnconnectedKind};
use crate::transport::{Counters, Endpoint, EventListener, Peer};

/// Cap on the decoded string of an unconnected message.
const UNCONNECTED_STRING_CAP: usize = 100;

/// Session parameters. Defaults mirror the demo scenario: port 9050,
/// capacity 2, app id "myapp1", merge on, 15 ms between poll cycles.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Address the client connects to.
    pub server_host: String,
    pub server_port: u16,
    pub max_peers: usize,
    pub app_id: String,
    /// Datagram merging on the client endpoint.
    pub merge_enabled: bool,
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 9050,
            max_peers: 2,
            app_id: "myapp1".to_string(),
            merge_enabled: true,
            poll_interval: Duration::from_millis(15),
        }
    }
}

/// Server-side listener: logs everything, and on every connect enumerates
/// all currently connected peers of the owning endpoint.
#[derive(Debug, Default)]
pub struct ServerListener {
    pub connect_count: u64,
    pub disconnect_count: u64,
    pub error_count: u64,
    pub unconnected_count: u64,
    /// Peer count observed during the latest connect enumeration.
    pub last_enumerated: usize,
}

impl EventListener for ServerListener {
    fn on_peer_connected(&mut self, endpoint: &Endpoint, peer: &Peer) {
        self.connect_count += 1;
        println!("[Server] peer connected: {}", peer.addr());
        let peers = endpoint.connected_peers();
        self.last_enumerated = peers.len();
        for p in peers {
            println!("[Server]   connected: id={}, addr={}", p.id(), p.addr());
        }
    }

    fn on_peer_disconnected(
        &mut self,
        _endpoint: &Endpoint,
        peer: &Peer,
        reason: DisconnectReason,
    ) {
        self.disconnect_count += 1;
        println!(
            "[Server] peer disconnected: {}, reason: {}",
            peer.addr(),
            reason
        );
    }

    fn on_network_error(&mut self, addr: SocketAddr, error_code: i32) {
        self.error_count += 1;
        println!("[Server] error {} at {}", error_code, addr);
    }

    fn on_receive(&mut self, _endpoint: &Endpoint, peer: &Peer, data: &[u8]) {
        println!("[Server] received {} bytes from {}", data.len(), peer.addr());
    }

    fn on_receive_unconnected(&mut self, addr: SocketAddr, data: &[u8], kind: UnconnectedKind) {
        self.unconnected_count += 1;
        let mut reader = DataReader::new(data);
        match reader.get_str(UNCONNECTED_STRING_CAP) {
            Some(text) => println!("[Server] unconnected ({:?}) from {}: {}", kind, addr, text),
            None => println!(
                "[Server] unconnected ({:?}) from {}: {} raw bytes",
                kind,
                addr,
                data.len()
            ),
        }
    }

    fn on_latency_update(&mut self, peer: &Peer, latency_ms: u32) {
        println!("[Server] latency {} ms for {}", latency_ms, peer.addr());
    }
}

/// Client-side listener: logs connect/disconnect/error; receive-type
/// callbacks stay no-ops.
#[derive(Debug, Default)]
pub struct ClientListener {
    pub connect_count: u64,
    pub disconnect_count: u64,
    pub error_count: u64,
    pub last_server_addr: Option<SocketAddr>,
    pub last_disconnect_reason: Option<DisconnectReason>,
}

impl EventListener for ClientListener {
    fn on_peer_connected(&mut self, _endpoint: &Endpoint, peer: &Peer) {
        self.connect_count += 1;
        self.last_server_addr = Some(peer.addr());
        println!("[Client] connected to: {}", peer.addr());
    }

    fn on_peer_disconnected(
        &mut self,
        _endpoint: &Endpoint,
        _peer: &Peer,
        reason: DisconnectReason,
    ) {
        self.disconnect_count += 1;
        self.last_disconnect_reason = Some(reason);
        println!("[Client] disconnected: {}", reason);
    }

    fn on_network_error(&mut self, addr: SocketAddr, error_code: i32) {
        self.error_count += 1;
        println!("[Client] error {} at {}", error_code, addr);
    }
}

/// Owns both endpoints and their listeners, drives the whole
/// start/connect/poll/stop lifecycle.
pub struct SessionManager {
    server: Endpoint,
    client: Endpoint,
    server_listener: ServerListener,
    client_listener: ClientListener,
    poll_interval: Duration,
}

impl SessionManager {
    /// Build the session: server endpoint first, bound to the fixed port; a
    /// bind failure aborts here, before any client endpoint exists. Then the
    /// client starts on an ephemeral port and issues one fire-and-forget
    /// connect.
    pub fn start(config: &SessionConfig) -> io::Result<Self> {
        let mut server = Endpoint::new(config.max_peers, &config.app_id)?;
        server
            .start(Some(config.server_port))
            .map_err(|e| annotate("server start failed", e))?;

        let mut client = Endpoint::new(1, &config.app_id)?;
        client.set_merge_enabled(config.merge_enabled);
        if let Err(e) = client.start(None) {
            server.stop();
            return Err(annotate("client start failed", e));
        }
        if let Err(e) = client.connect(&config.server_host, config.server_port) {
            client.stop();
            server.stop();
            return Err(annotate("client connect failed", e));
        }

        Ok(Self {
            server,
            client,
            server_listener: ServerListener::default(),
            client_listener: ClientListener::default(),
            poll_interval: config.poll_interval,
        })
    }

    /// One poll cycle: server endpoint first, then client, each draining and
    /// dispatching all queued events synchronously.
    pub fn poll_once(&mut self) -> io::Result<()> {
        self.server.poll_events(&mut self.server_listener)?;
        self.client.poll_events(&mut self.client_listener)?;
        Ok(())
    }

    /// Poll both endpoints until `stop` is set, sleeping for the configured
    /// interval between cycles. The flag is evaluated once per cycle
    /// boundary; a cycle in progress is never preempted.
    pub fn run(&mut self, stop: &AtomicBool) -> io::Result<()> {
        while !stop.load(Ordering::Relaxed) {
            self.poll_once()?;
            thread::sleep(self.poll_interval);
        }
        Ok(())
    }

    /// Stop both endpoints, releasing their sockets. Terminal.
    pub fn shutdown(&mut self) {
        self.client.stop();
        self.server.stop();
    }

    /// Counter snapshot of both endpoints, for the final report.
    pub fn reporter(&self) -> StatsReporter {
        StatsReporter::new(self.server.counters(), self.client.counters())
    }

    pub fn server(&self) -> &Endpoint {
        &self.server
    }

    pub fn client(&self) -> &Endpoint {
        &self.client
    }

    pub fn server_listener(&self) -> &ServerListener {
        &self.server_listener
    }

    pub fn client_listener(&self) -> &ClientListener {
        &self.client_listener
    }
}

fn annotate(context: &str, e: io::Error) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {}", context, e))
}

/// Fixed-order counter report: server block first, then client; within each
/// block bytes received, packets received, bytes sent, packets sent.
pub struct StatsReporter {
    server: Counters,
    client: Counters,
}

impl StatsReporter {
    pub fn new(server: Counters, client: Counters) -> Self {
        Self { server, client }
    }

    pub fn write_report<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        write_block(w, "ServerStats", &self.server)?;
        write_block(w, "ClientStats", &self.client)?;
        Ok(())
    }

    pub fn print(&self) {
        let mut out = io::stdout();
        if self.write_report(&mut out).is_err() {
            eprintln!("failed to write stats report");
        }
    }
}

fn write_block<W: io::Write>(w: &mut W, label: &str, c: &Counters) -> io::Result<()> {
    writeln!(w, "{}:", label)?;
    writeln!(w, "  BytesReceived:   {}", c.bytes_received)?;
    writeln!(w, "  PacketsReceived: {}", c.packets_received)?;
    writeln!(w, "  BytesSent:       {}", c.bytes_sent)?;
    writeln!(w, "  PacketsSent:     {}", c.packets_sent)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_demo_scenario() {
        let config = SessionConfig::default();
        assert_eq!(config.server_port, 9050);
        assert_eq!(config.max_peers, 2);
        assert_eq!(config.app_id, "myapp1");
        assert!(config.merge_enabled);
        assert_eq!(config.poll_interval, Duration::from_millis(15));
    }

    #[test]
    fn test_report_fixed_order() {
        let server = Counters {
            bytes_sent: 1,
            packets_sent: 2,
            bytes_received: 3,
            packets_received: 4,
        };
        let client = Counters {
            bytes_sent: 5,
            packets_sent: 6,
            bytes_received: 7,
            packets_received: 8,
        };

        let mut out = Vec::new();
        StatsReporter::new(server, client)
            .write_report(&mut out)
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let server_pos = text.find("ServerStats").unwrap();
        let client_pos = text.find("ClientStats").unwrap();
        assert!(server_pos < client_pos);

        // per-block field order: bytes recv, packets recv, bytes sent, packets sent
        let server_block = &text[server_pos..client_pos];
        let br = server_block.find("BytesReceived:   3").unwrap();
        let pr = server_block.find("PacketsReceived: 4").unwrap();
        let bs = server_block.find("BytesSent:       1").unwrap();
        let ps = server_block.find("PacketsSent:     2").unwrap();
        assert!(br < pr && pr < bs && bs < ps);
    }
}
