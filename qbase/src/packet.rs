use std::fmt;

/// Errors parsing packet headers.
pub mod error;
/// Packet headers, their parsing and writing.
pub mod header;
/// Packet number truncation and recovery.
pub mod number;

pub use error::Error;
pub use header::{
    EncodeHeader, GetDcid, GetScid, HandshakeHeader, Header, InitialHeader, InvariantHeader,
    LongHeader, LongHeaderBuilder, OneRttHeader, RetryHeader, UnsupportedVersionHeader,
    VersionNegotiationHeader, WriteHeader, ZeroRttHeader, compose_version_negotiation,
};
pub use number::{PacketNumber, PacketNumberLen, WritePacketNumber};

/// A client must pad the datagrams carrying its Initial packets to at least
/// this size.
pub const MIN_INITIAL_PACKET_SIZE: usize = 1200;
/// The datagram size used before the peer's address family is known.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1200;
/// The largest datagram sent over IPv4.
pub const MAX_PACKET_SIZE_IPV4: usize = 1252;
/// The largest datagram sent over IPv6.
pub const MAX_PACKET_SIZE_IPV6: usize = 1232;

/// The encryption level a packet is protected at, which decides the header
/// form and the sealer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EncryptionLevel {
    Initial,
    Handshake,
    ZeroRtt,
    OneRtt,
}

impl EncryptionLevel {
    /// Only 1-RTT packets have a short header.
    pub fn has_long_header(self) -> bool {
        self != EncryptionLevel::OneRtt
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EncryptionLevel::Initial => "Initial",
            EncryptionLevel::Handshake => "Handshake",
            EncryptionLevel::ZeroRtt => "0-RTT",
            EncryptionLevel::OneRtt => "1-RTT",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::EncryptionLevel;

    #[test]
    fn test_encryption_level() {
        assert!(EncryptionLevel::Initial < EncryptionLevel::OneRtt);
        assert!(EncryptionLevel::ZeroRtt.has_long_header());
        assert!(!EncryptionLevel::OneRtt.has_long_header());
        assert_eq!(EncryptionLevel::ZeroRtt.to_string(), "0-RTT");
    }
}
