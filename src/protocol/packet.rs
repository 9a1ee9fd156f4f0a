//! Wire packet format
//!
//! One packet per UDP datagram (or per merged sub-frame):
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Header (8 bytes): magic u32, ver u8, kind u8,│
//! │                   reserved u16               │
//! ├──────────────────────────────────────────────┤
//! │ Kind-specific body (variable)                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The transport is unreliable by design: anything that fails validation is
//! dropped without a response.

use super::writer::{DataReader, DataWriter};

pub const MAGIC: u32 = 0x4352_5257; // "CRRW"
pub const VERSION: u8 = 1;
pub const HEADER_SIZE: usize = 8;

/// Largest datagram the transport will emit. Conservative single-MTU value;
/// fragmentation is out of scope.
pub const MAX_DATAGRAM_SIZE: usize = 1400;
/// Largest application payload in a Data/Unconnected packet.
pub const MAX_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - HEADER_SIZE;
/// Application identifier cap in the connect handshake.
pub const MAX_APP_ID_LEN: usize = 64;

/// Packet discriminator on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    ConnectRequest = 1,
    ConnectAccept = 2,
    ConnectReject = 3,
    Disconnect = 4,
    Ping = 5,
    Pong = 6,
    Data = 7,
    Unconnected = 8,
    Merged = 9,
}

impl PacketKind {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::ConnectRequest),
            2 => Some(Self::ConnectAccept),
            3 => Some(Self::ConnectReject),
            4 => Some(Self::Disconnect),
            5 => Some(Self::Ping),
            6 => Some(Self::Pong),
            7 => Some(Self::Data),
            8 => Some(Self::Unconnected),
            9 => Some(Self::Merged),
            _ => None,
        }
    }
}

/// Why a connection went away.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local side asked for the disconnect.
    DisconnectCalled = 1,
    /// The remote side closed the connection.
    RemoteClose = 2,
    /// No traffic from the peer within the timeout window.
    Timeout = 3,
    /// A connect request was never answered.
    ConnectionFailed = 4,
    /// The remote endpoint refused the connect request.
    Rejected = 5,
}

impl DisconnectReason {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::DisconnectCalled),
            2 => Some(Self::RemoteClose),
            3 => Some(Self::Timeout),
            4 => Some(Self::ConnectionFailed),
            5 => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::DisconnectCalled => "disconnect called",
            Self::RemoteClose => "remote close",
            Self::Timeout => "timeout",
            Self::ConnectionFailed => "connection failed",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Class of a connectionless message.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnconnectedKind {
    Basic = 1,
    Broadcast = 2,
}

impl UnconnectedKind {
    #[inline(always)]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Basic),
            2 => Some(Self::Broadcast),
            _ => None,
        }
    }
}

/// Decoded wire packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    ConnectRequest { nonce: u64, app_id: String },
    ConnectAccept { nonce: u64, peer_id: u64 },
    ConnectReject { reason: DisconnectReason },
    Disconnect { reason: DisconnectReason },
    Ping { token: u64 },
    Pong { token: u64 },
    Data { payload: Vec<u8> },
    Unconnected { kind: UnconnectedKind, payload: Vec<u8> },
    /// Coalesced small packets: `[len u16][frame bytes]` repeated. Frames
    /// are complete packets themselves; nesting is rejected on decode.
    Merged { frames: Vec<Vec<u8>> },
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::ConnectRequest { .. } => PacketKind::ConnectRequest,
            Self::ConnectAccept { .. } => PacketKind::ConnectAccept,
            Self::ConnectReject { .. } => PacketKind::ConnectReject,
            Self::Disconnect { .. } => PacketKind::Disconnect,
            Self::Ping { .. } => PacketKind::Ping,
            Self::Pong { .. } => PacketKind::Pong,
            Self::Data { .. } => PacketKind::Data,
            Self::Unconnected { .. } => PacketKind::Unconnected,
            Self::Merged { .. } => PacketKind::Merged,
        }
    }

    /// Encode into `w`, appending header then body.
    pub fn encode(&self, w: &mut DataWriter) {
        w.put_u32(MAGIC);
        w.put_u8(VERSION);
        w.put_u8(self.kind() as u8);
        w.put_u16(0); // reserved

        match self {
            Self::ConnectRequest { nonce, app_id } => {
                w.put_u64(*nonce);
                w.put_str(app_id);
            }
            Self::ConnectAccept { nonce, peer_id } => {
                w.put_u64(*nonce);
                w.put_u64(*peer_id);
            }
            Self::ConnectReject { reason } | Self::Disconnect { reason } => {
                w.put_u8(*reason as u8);
            }
            Self::Ping { token } | Self::Pong { token } => {
                w.put_u64(*token);
            }
            Self::Data { payload } => {
                w.put_bytes(payload);
            }
            Self::Unconnected { kind, payload } => {
                w.put_u8(*kind as u8);
                w.put_bytes(payload);
            }
            Self::Merged { frames } => {
                for frame in frames {
                    w.put_u16(frame.len() as u16);
                    w.put_bytes(frame);
                }
            }
        }
    }

    /// Decode a single datagram. `None` means the datagram is dropped.
    pub fn decode(buf: &[u8]) -> Option<Packet> {
        let mut r = DataReader::new(buf);
        if r.get_u32()? != MAGIC {
            return None;
        }
        if r.get_u8()? != VERSION {
            return None;
        }
        let kind = PacketKind::from_u8(r.get_u8()?)?;
        let _reserved = r.get_u16()?;

        let packet = match kind {
            PacketKind::ConnectRequest => Self::ConnectRequest {
                nonce: r.get_u64()?,
                app_id: r.get_str(MAX_APP_ID_LEN)?,
            },
            PacketKind::ConnectAccept => Self::ConnectAccept {
                nonce: r.get_u64()?,
                peer_id: r.get_u64()?,
            },
            PacketKind::ConnectReject => Self::ConnectReject {
                reason: DisconnectReason::from_u8(r.get_u8()?)?,
            },
            PacketKind::Disconnect => Self::Disconnect {
                reason: DisconnectReason::from_u8(r.get_u8()?)?,
            },
            PacketKind::Ping => Self::Ping { token: r.get_u64()? },
            PacketKind::Pong => Self::Pong { token: r.get_u64()? },
            PacketKind::Data => Self::Data {
                payload: r.take_rest().to_vec(),
            },
            PacketKind::Unconnected => Self::Unconnected {
                kind: UnconnectedKind::from_u8(r.get_u8()?)?,
                payload: r.take_rest().to_vec(),
            },
            PacketKind::Merged => {
                let mut frames = Vec::new();
                while r.remaining() > 0 {
                    let len = r.get_u16()? as usize;
                    frames.push(r.take(len)?.to_vec());
                }
                if frames.is_empty() {
                    return None;
                }
                Self::Merged { frames }
            }
        };

        Some(packet)
    }

    /// Encode into a fresh buffer. Convenience for queueing.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = DataWriter::with_capacity(HEADER_SIZE + 64);
        self.encode(&mut w);
        w.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(packet: Packet) -> Packet {
        let bytes = packet.to_bytes();
        Packet::decode(&bytes).expect("decode failed")
    }

    #[test]
    fn test_connect_request_roundtrip() {
        let p = Packet::ConnectRequest {
            nonce: 77,
            app_id: "myapp1".to_string(),
        };
        assert_eq!(roundtrip(p.clone()), p);
    }

    #[test]
    fn test_connect_accept_roundtrip() {
        let p = Packet::ConnectAccept {
            nonce: 77,
            peer_id: 3,
        };
        assert_eq!(roundtrip(p.clone()), p);
    }

    #[test]
    fn test_control_roundtrips() {
        for p in [
            Packet::ConnectReject {
                reason: DisconnectReason::Rejected,
            },
            Packet::Disconnect {
                reason: DisconnectReason::DisconnectCalled,
            },
            Packet::Ping { token: 123 },
            Packet::Pong { token: 123 },
        ] {
            assert_eq!(roundtrip(p.clone()), p);
        }
    }

    #[test]
    fn test_data_payload_roundtrip() {
        let p = Packet::Data {
            payload: b"hello".to_vec(),
        };
        assert_eq!(roundtrip(p.clone()), p);
    }

    #[test]
    fn test_unconnected_kinds() {
        for kind in [UnconnectedKind::Basic, UnconnectedKind::Broadcast] {
            let p = Packet::Unconnected {
                kind,
                payload: b"ping".to_vec(),
            };
            assert_eq!(roundtrip(p.clone()), p);
        }
    }

    #[test]
    fn test_merged_framing() {
        let a = Packet::Ping { token: 1 }.to_bytes();
        let b = Packet::Data {
            payload: b"x".to_vec(),
        }
        .to_bytes();
        let merged = Packet::Merged {
            frames: vec![a.clone(), b.clone()],
        };

        match roundtrip(merged) {
            Packet::Merged { frames } => {
                assert_eq!(frames, vec![a, b]);
            }
            other => panic!("unexpected packet: {:?}", other),
        }
    }

    #[test]
    fn test_bad_magic_dropped() {
        let mut bytes = Packet::Ping { token: 1 }.to_bytes();
        bytes[0] ^= 0xFF;
        assert_eq!(Packet::decode(&bytes), None);
    }

    #[test]
    fn test_bad_version_dropped() {
        let mut bytes = Packet::Ping { token: 1 }.to_bytes();
        bytes[4] = VERSION + 1;
        assert_eq!(Packet::decode(&bytes), None);
    }

    #[test]
    fn test_oversized_app_id_dropped() {
        let p = Packet::ConnectRequest {
            nonce: 1,
            app_id: "x".repeat(MAX_APP_ID_LEN + 1),
        };
        assert_eq!(Packet::decode(&p.to_bytes()), None);
    }

    #[test]
    fn test_truncated_packet_dropped() {
        let bytes = Packet::ConnectAccept {
            nonce: 1,
            peer_id: 2,
        }
        .to_bytes();
        assert_eq!(Packet::decode(&bytes[..bytes.len() - 3]), None);
    }
}
