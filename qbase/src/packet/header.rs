use bytes::{BufMut, Bytes, BytesMut};
use enum_dispatch::enum_dispatch;
use nom::number::streaming::{be_u8, be_u32};
use rand::Rng;

use super::{error::Error, number::PacketNumber};
use crate::{
    cid::{ConnectionId, be_connection_id_with_len},
    varint::VarInt,
    version::Version,
};

/// All structure definitions related to long headers.
pub mod long;
/// All structure definitions related to short headers.
pub mod short;

#[doc(hidden)]
pub use long::{
    Handshake, HandshakeHeader, Initial, InitialHeader, LongHeader, LongHeaderBuilder, Retry,
    RetryHeader, UnsupportedVersion, UnsupportedVersionHeader, VersionNegotiation,
    VersionNegotiationHeader, ZeroRtt, ZeroRttHeader,
};
#[doc(hidden)]
pub use short::OneRttHeader;

const LONG_HEADER_BIT: u8 = 0x80;

/// When encoding a packet for sending, the size of the header must be known
/// before the payload is assembled.
///
/// The `Length` field of long headers counts as 2 bytes, the fixed width it
/// is always written in.
#[enum_dispatch]
pub trait EncodeHeader {
    /// Returns the length of the encoded packet header, packet number included.
    fn size(&self) -> usize;
}

/// Get the Destination Connection ID (DCID) of the packet, each packet has a DCID.
#[enum_dispatch]
pub trait GetDcid {
    /// Get the Destination Connection ID (DCID) of the packet.
    fn dcid(&self) -> &ConnectionId;
}

/// Get the Source Connection ID (SCID) of the packet, only long packets have SCID.
pub trait GetScid {
    /// Get the Source Connection ID (SCID) of the packet.
    fn scid(&self) -> &ConnectionId;
}

/// The version independent part of a packet header.
///
/// It can be read from any QUIC packet, whatever its version, and is all that
/// is needed to route a datagram to its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantHeader {
    first_byte: u8,
    version: Option<Version>,
    dcid: ConnectionId,
    scid: ConnectionId,
    len: usize,
}

impl InvariantHeader {
    /// Parse the invariant header at the start of `datagram`.
    ///
    /// Short headers do not carry the length of the destination connection
    /// ID, `short_dcid_len` is used instead.
    pub fn parse(datagram: &[u8], short_dcid_len: usize) -> Result<Self, Error> {
        let (remain, first_byte) = be_u8::<_, nom::error::Error<&[u8]>>(datagram)?;
        let (remain, version, dcid, scid) = if first_byte & LONG_HEADER_BIT != 0 {
            let (remain, version) = be_u32::<_, nom::error::Error<&[u8]>>(remain)?;
            let (remain, dcid, scid) = long::be_long_cids(remain)?;
            (remain, Some(Version(version)), dcid, scid)
        } else {
            let (remain, dcid) = be_connection_id_with_len(short_dcid_len)(remain)?;
            (remain, None, dcid, ConnectionId::default())
        };
        Ok(Self {
            first_byte,
            version,
            dcid,
            scid,
            len: datagram.len() - remain.len(),
        })
    }

    pub fn is_long_header(&self) -> bool {
        self.version.is_some()
    }

    /// `None` for a short header.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    pub fn dcid(&self) -> &ConnectionId {
        &self.dcid
    }

    /// Empty for a short header.
    pub fn scid(&self) -> &ConnectionId {
        &self.scid
    }

    /// The number of bytes the invariant header takes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// The sum type of all packet headers.
#[derive(Debug, Clone, PartialEq, Eq)]
#[enum_dispatch(GetDcid, EncodeHeader)]
pub enum Header {
    VersionNegotiation(VersionNegotiationHeader),
    Retry(RetryHeader),
    Initial(InitialHeader),
    ZeroRtt(ZeroRttHeader),
    Handshake(HandshakeHeader),
    OneRtt(OneRttHeader),
    UnsupportedVersion(UnsupportedVersionHeader),
}

impl Header {
    /// Parse the version dependent rest of a header, `input` being the
    /// datagram after the `invariant` header.
    ///
    /// Returns the bytes after the header: the payload of packets protected by
    /// a sealer, nothing for Retry and Version Negotiation, everything for
    /// versions not supported.
    pub fn parse(invariant: InvariantHeader, input: &[u8]) -> Result<(&[u8], Header), Error> {
        let InvariantHeader {
            first_byte,
            version,
            dcid,
            scid,
            ..
        } = invariant;
        let Some(version) = version else {
            let (remain, one_rtt) = short::be_one_rtt_rest(first_byte, dcid, input)?;
            return Ok((remain, Header::OneRtt(one_rtt)));
        };

        let builder = LongHeaderBuilder::with_cid(version, dcid, scid);
        if version == Version::NEGOTIATION {
            let vn = long::be_version_negotiation(input)?;
            return Ok((&input[input.len()..], Header::VersionNegotiation(builder.wrap(vn))));
        }
        if !version.is_supported() {
            return Ok((input, Header::UnsupportedVersion(builder.wrap(UnsupportedVersion))));
        }

        match first_byte & !LONG_HEADER_BIT {
            long::INITIAL_TYPE => {
                let (remain, initial) = long::be_initial(input)?;
                Ok((remain, Header::Initial(builder.wrap(initial))))
            }
            long::RETRY_TYPE => {
                let (remain, retry) = long::be_retry(input)?;
                Ok((remain, Header::Retry(builder.wrap(retry))))
            }
            long::HANDSHAKE_TYPE => {
                let (remain, handshake) = long::be_handshake(input)?;
                Ok((remain, Header::Handshake(builder.wrap(handshake))))
            }
            long::ZERO_RTT_TYPE => {
                let (remain, zero_rtt) = long::be_zero_rtt(input)?;
                Ok((remain, Header::ZeroRtt(builder.wrap(zero_rtt))))
            }
            ty => Err(Error::InvalidPacketHeader(format!(
                "Received packet with invalid packet type: {ty}"
            ))),
        }
    }

    pub fn is_long_header(&self) -> bool {
        !matches!(self, Header::OneRtt(_))
    }

    pub fn is_version_negotiation(&self) -> bool {
        matches!(self, Header::VersionNegotiation(_))
    }

    /// Empty for a short header.
    pub fn scid(&self) -> &ConnectionId {
        static EMPTY: ConnectionId = ConnectionId::EMPTY;
        match self {
            Header::VersionNegotiation(h) => &h.scid,
            Header::Retry(h) => &h.scid,
            Header::Initial(h) => &h.scid,
            Header::ZeroRtt(h) => &h.scid,
            Header::Handshake(h) => &h.scid,
            Header::UnsupportedVersion(h) => &h.scid,
            Header::OneRtt(_) => &EMPTY,
        }
    }

    /// `None` for a short header.
    pub fn version(&self) -> Option<Version> {
        match self {
            Header::VersionNegotiation(h) => Some(h.version),
            Header::Retry(h) => Some(h.version),
            Header::Initial(h) => Some(h.version),
            Header::ZeroRtt(h) => Some(h.version),
            Header::Handshake(h) => Some(h.version),
            Header::UnsupportedVersion(h) => Some(h.version),
            Header::OneRtt(_) => None,
        }
    }

    /// The truncated packet number of the packets protected by a sealer.
    pub fn packet_number(&self) -> Option<PacketNumber> {
        match self {
            Header::Initial(h) => Some(h.pn),
            Header::ZeroRtt(h) => Some(h.pn),
            Header::Handshake(h) => Some(h.pn),
            Header::OneRtt(h) => Some(h.pn),
            _ => None,
        }
    }

    /// The `Length` field, only long headers followed by a payload have one.
    pub fn length(&self) -> Option<VarInt> {
        match self {
            Header::Initial(h) => Some(h.length),
            Header::ZeroRtt(h) => Some(h.length),
            Header::Handshake(h) => Some(h.length),
            _ => None,
        }
    }
}

/// A [`bytes::BufMut`] extension trait for writing packet headers.
///
/// `payload_len` is the size of everything following the packet number,
/// seal overhead included. Only the `Length` field of Initial, Handshake and
/// 0-RTT headers depends on it, it is computed from it and never taken from
/// the header itself.
pub trait WriteHeader<H> {
    fn put_header(&mut self, header: &H, payload_len: usize);
}

impl<B: BufMut> WriteHeader<Header> for B {
    fn put_header(&mut self, header: &Header, payload_len: usize) {
        match header {
            Header::VersionNegotiation(h) => self.put_header(h, payload_len),
            Header::Retry(h) => self.put_header(h, payload_len),
            Header::Initial(h) => self.put_header(h, payload_len),
            Header::ZeroRtt(h) => self.put_header(h, payload_len),
            Header::Handshake(h) => self.put_header(h, payload_len),
            Header::OneRtt(h) => self.put_header(h, payload_len),
            Header::UnsupportedVersion(h) => {
                long::put_long_prefix(self, LONG_HEADER_BIT, h.version, &h.dcid, &h.scid)
            }
        }
    }
}

/// Compose a Version Negotiation packet in reply to a packet from `scid` to
/// `dcid` of a version not supported.
///
/// The connection IDs are echoed swapped. A random reserved version is listed
/// after `versions`, so that peers do not come to rely on the list.
///
/// # Panics
///
/// If a connection ID length has no nibble encoding, which can not happen
/// for connection IDs taken from a long header.
pub fn compose_version_negotiation(
    dcid: &ConnectionId,
    scid: &ConnectionId,
    versions: &[Version],
) -> Bytes {
    let mut versions = versions.to_vec();
    versions.push(Version::random_reserved());
    let header = LongHeaderBuilder::with_cid(Version::NEGOTIATION, *dcid, *scid)
        .wrap(VersionNegotiation { versions });

    let mut buf = BytesMut::with_capacity(header.size());
    buf.put_header(&header, 0);
    // the type bits of a Version Negotiation packet carry no meaning
    buf[0] = LONG_HEADER_BIT | rand::rng().random::<u8>();
    buf.freeze()
}
