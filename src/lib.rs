//! Courier - Connection-Oriented UDP Messaging Demo
//!
//! Two halves, order-independent:
//! - Serializer benchmark: bincode (reflective) vs DataWriter (hand-coded)
//! - Session demo: one server + one client endpoint over unreliable UDP,
//!   driven by a single cooperative poll loop with traffic counters
//!
//! The transport is deliberately thin: connect handshake, keep-alive,
//! disconnect reasons, optional datagram merging. No reliability, no
//! ordering, no fragmentation.

pub mod bench;
pub mod protocol;
pub mod session;
pub mod transport;
