//! Event listener capability
//!
//! Callbacks are dispatched synchronously from `Endpoint::poll_events`, on
//! the polling thread, never concurrently for one endpoint. Peer-scoped
//! callbacks receive the owning endpoint as context, so a listener can
//! enumerate currently connected peers without holding a handle of its own.

use std::net::SocketAddr;

use crate::protocol::{DisconnectReason, UnconnectedKind};

use super::endpoint::Endpoint;
use super::peer::{Peer, PeerId};

/// Callback surface for transport events. All operations default to no-ops;
/// a variant overrides the ones it cares about.
pub trait EventListener {
    /// A connection was established (accepted or confirmed).
    fn on_peer_connected(&mut self, _endpoint: &Endpoint, _peer: &Peer) {}

    /// A connection went away. The peer is already removed from the
    /// endpoint's enumeration when this fires.
    fn on_peer_disconnected(
        &mut self,
        _endpoint: &Endpoint,
        _peer: &Peer,
        _reason: DisconnectReason,
    ) {
    }

    /// Non-fatal socket error; the endpoint keeps running.
    fn on_network_error(&mut self, _addr: SocketAddr, _error_code: i32) {}

    /// Application data from a connected peer.
    fn on_receive(&mut self, _endpoint: &Endpoint, _peer: &Peer, _data: &[u8]) {}

    /// Connectionless message from an arbitrary address.
    fn on_receive_unconnected(
        &mut self,
        _addr: SocketAddr,
        _data: &[u8],
        _kind: UnconnectedKind,
    ) {
    }

    /// Fresh latency estimate for a connected peer.
    fn on_latency_update(&mut self, _peer: &Peer, _latency_ms: u32) {}
}

/// Internal staged event, produced while the endpoint mutates its own state
/// and dispatched to the listener afterwards in arrival order.
#[derive(Debug)]
pub(crate) enum Event {
    PeerConnected(PeerId),
    /// Carries the removed peer by value; it is gone from the table.
    PeerDisconnected(Peer, DisconnectReason),
    NetworkError(SocketAddr, i32),
    Receive(PeerId, Vec<u8>),
    ReceiveUnconnected(SocketAddr, Vec<u8>, UnconnectedKind),
    LatencyUpdate(PeerId, u32),
}
