//! Protocol layer: hand-rolled binary codec and wire packets
//!
//! Design:
//! - Little-endian, length-prefixed encoding via a reusable writer
//! - One packet per datagram, 8-byte header with magic + version
//! - Invalid input is dropped, never answered

mod packet;
mod writer;

pub use packet::{
    DisconnectReason, Packet, PacketKind, UnconnectedKind, HEADER_SIZE, MAGIC,
    MAX_APP_ID_LEN, MAX_DATAGRAM_SIZE, MAX_PAYLOAD_SIZE, VERSION,
};
pub use writer::{DataReader, DataWriter};
