//! Transport layer: connection-oriented UDP endpoints
//!
//! One `Endpoint` per role (server or client), each owning its socket, peer
//! table and counters. Single-threaded cooperative model: everything happens
//! on the thread that calls `poll_events`, callbacks included.

mod endpoint;
mod event;
mod peer;

pub use endpoint::{Counters, Endpoint, EndpointState};
pub use event::EventListener;
pub use peer::{Peer, PeerId};
