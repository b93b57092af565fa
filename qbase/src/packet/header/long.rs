use bytes::{BufMut, Bytes};
use deref_derive::{Deref, DerefMut};
use nom::{Parser, combinator::map, multi::length_data, number::streaming::be_u8};

use super::{EncodeHeader, GetDcid, GetScid, WriteHeader};
use crate::{
    cid::{
        ConnectionId, WriteConnectionId, be_connection_id_with_len, decode_cid_len,
        encode_cid_len,
    },
    packet::{
        error::Error,
        number::{PacketNumber, WritePacketNumber, be_long_packet_number},
    },
    varint::{EncodeBytes, VarInt, WriteVarInt, be_varint},
    version::Version,
};

pub(super) const INITIAL_TYPE: u8 = 0x7f;
pub(super) const RETRY_TYPE: u8 = 0x7e;
pub(super) const HANDSHAKE_TYPE: u8 = 0x7d;
pub(super) const ZERO_RTT_TYPE: u8 = 0x7c;

/// The `Length` field is always written in 2 bytes, enough for any datagram.
const LENGTH_FIELD_SIZE: usize = 2;

/// The list of versions a server supports, sent in reply to a packet of a
/// version it does not.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct VersionNegotiation {
    pub versions: Vec<Version>,
}

/// A server's request to resend the Initial packet with the token.
///
/// The token has no length prefix, it extends to the end of the datagram.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Retry {
    pub odcid: ConnectionId,
    pub token: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Initial {
    pub token: Bytes,
    /// The `Length` field as received, it is recomputed when writing.
    pub length: VarInt,
    pub pn: PacketNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// The `Length` field as received, it is recomputed when writing.
    pub length: VarInt,
    pub pn: PacketNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroRtt {
    /// The `Length` field as received, it is recomputed when writing.
    pub length: VarInt,
    pub pn: PacketNumber,
}

/// A long header of a version this implementation can not parse beyond the
/// invariant fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnsupportedVersion;

#[derive(Debug, Default, Clone, PartialEq, Eq, Deref, DerefMut)]
pub struct LongHeader<T> {
    pub version: Version,
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
    #[deref]
    pub specific: T,
}

pub type VersionNegotiationHeader = LongHeader<VersionNegotiation>;
pub type RetryHeader = LongHeader<Retry>;
pub type InitialHeader = LongHeader<Initial>;
pub type HandshakeHeader = LongHeader<Handshake>;
pub type ZeroRttHeader = LongHeader<ZeroRtt>;
pub type UnsupportedVersionHeader = LongHeader<UnsupportedVersion>;

impl<T> GetDcid for LongHeader<T> {
    fn dcid(&self) -> &ConnectionId {
        &self.dcid
    }
}

impl<T> GetScid for LongHeader<T> {
    fn scid(&self) -> &ConnectionId {
        &self.scid
    }
}

/// The size of the fields following the invariant prefix.
pub trait SpecificSize {
    fn specific_size(&self) -> usize;
}

impl SpecificSize for VersionNegotiation {
    fn specific_size(&self) -> usize {
        4 * self.versions.len()
    }
}

impl SpecificSize for Retry {
    fn specific_size(&self) -> usize {
        1 + self.odcid.len() + self.token.len()
    }
}

impl SpecificSize for Initial {
    fn specific_size(&self) -> usize {
        VarInt(self.token.len() as u64).encoding_size()
            + self.token.len()
            + LENGTH_FIELD_SIZE
            + self.pn.size()
    }
}

impl SpecificSize for Handshake {
    fn specific_size(&self) -> usize {
        LENGTH_FIELD_SIZE + self.pn.size()
    }
}

impl SpecificSize for ZeroRtt {
    fn specific_size(&self) -> usize {
        LENGTH_FIELD_SIZE + self.pn.size()
    }
}

impl SpecificSize for UnsupportedVersion {
    fn specific_size(&self) -> usize {
        0
    }
}

impl<T: SpecificSize> EncodeHeader for LongHeader<T> {
    fn size(&self) -> usize {
        // first byte, version, connection ID lengths
        1 + 4 + 1 + self.dcid.len() + self.scid.len() + self.specific.specific_size()
    }
}

/// Builds long headers sharing the same version and connection IDs.
#[derive(Debug, Clone, Copy)]
pub struct LongHeaderBuilder {
    pub(crate) version: Version,
    pub(crate) dcid: ConnectionId,
    pub(crate) scid: ConnectionId,
}

impl LongHeaderBuilder {
    pub fn with_cid(version: Version, dcid: ConnectionId, scid: ConnectionId) -> Self {
        Self {
            version,
            dcid,
            scid,
        }
    }

    pub fn initial(self, token: Bytes, pn: PacketNumber) -> InitialHeader {
        self.wrap(Initial {
            token,
            length: VarInt::default(),
            pn,
        })
    }

    pub fn handshake(self, pn: PacketNumber) -> HandshakeHeader {
        self.wrap(Handshake {
            length: VarInt::default(),
            pn,
        })
    }

    pub fn zero_rtt(self, pn: PacketNumber) -> ZeroRttHeader {
        self.wrap(ZeroRtt {
            length: VarInt::default(),
            pn,
        })
    }

    pub fn retry(self, odcid: ConnectionId, token: Bytes) -> RetryHeader {
        self.wrap(Retry { odcid, token })
    }

    pub fn wrap<T>(self, specific: T) -> LongHeader<T> {
        LongHeader {
            version: self.version,
            dcid: self.dcid,
            scid: self.scid,
            specific,
        }
    }
}

/// Parse a Version Negotiation body, a non-empty list of 4-byte versions
/// running to the end of the datagram.
pub(super) fn be_version_negotiation(input: &[u8]) -> Result<VersionNegotiation, Error> {
    if input.is_empty() {
        return Err(Error::InvalidVersionNegotiationPacket(
            "empty version list".to_owned(),
        ));
    }
    if input.len() % 4 != 0 {
        return Err(Error::InvalidVersionNegotiationPacket(format!(
            "version list of {} bytes is not a multiple of 4",
            input.len()
        )));
    }
    let versions = input
        .chunks_exact(4)
        .map(|chunk| Version(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
        .collect();
    Ok(VersionNegotiation { versions })
}

/// Parse a Retry body, which takes the rest of the datagram.
pub(super) fn be_retry(input: &[u8]) -> Result<(&[u8], Retry), Error> {
    let (remain, odcil) = be_u8::<_, nom::error::Error<&[u8]>>(input)?;
    let (remain, odcid) = be_connection_id_with_len(decode_cid_len(odcil)).parse(remain)?;
    let token = Bytes::copy_from_slice(remain);
    Ok((&remain[remain.len()..], Retry { odcid, token }))
}

pub(super) fn be_initial(input: &[u8]) -> Result<(&[u8], Initial), Error> {
    let (remain, token) =
        length_data(map(be_varint, |len| len.into_inner() as usize)).parse(input)?;
    let (remain, length) = be_varint(remain)?;
    let (remain, pn) = be_long_packet_number(remain)?;
    let token = Bytes::copy_from_slice(token);
    Ok((remain, Initial { token, length, pn }))
}

pub(super) fn be_handshake(input: &[u8]) -> Result<(&[u8], Handshake), Error> {
    let (remain, length) = be_varint(input)?;
    let (remain, pn) = be_long_packet_number(remain)?;
    Ok((remain, Handshake { length, pn }))
}

pub(super) fn be_zero_rtt(input: &[u8]) -> Result<(&[u8], ZeroRtt), Error> {
    let (remain, length) = be_varint(input)?;
    let (remain, pn) = be_long_packet_number(remain)?;
    Ok((remain, ZeroRtt { length, pn }))
}

/// Parse the connection IDs of a long header, after the version.
pub(super) fn be_long_cids(input: &[u8]) -> Result<(&[u8], ConnectionId, ConnectionId), Error> {
    let (remain, lens) = be_u8::<_, nom::error::Error<&[u8]>>(input)?;
    let (remain, dcid) = be_connection_id_with_len(decode_cid_len(lens >> 4)).parse(remain)?;
    let (remain, scid) = be_connection_id_with_len(decode_cid_len(lens)).parse(remain)?;
    Ok((remain, dcid, scid))
}

/// Write the first byte, version and connection IDs of a long header.
///
/// # Panics
///
/// If a connection ID length has no nibble encoding, see
/// [`ConnectionId::fits_long_header`].
pub(super) fn put_long_prefix<B: BufMut>(
    buf: &mut B,
    first_byte: u8,
    version: Version,
    dcid: &ConnectionId,
    scid: &ConnectionId,
) {
    let (Some(dcil), Some(scil)) = (encode_cid_len(dcid.len()), encode_cid_len(scid.len())) else {
        panic!(
            "connection IDs of {} and {} bytes do not fit a long header",
            dcid.len(),
            scid.len()
        );
    };
    buf.put_u8(first_byte);
    buf.put_u32(version.0);
    buf.put_u8((dcil << 4) | scil);
    buf.put_connection_id(dcid);
    buf.put_connection_id(scid);
}

/// Write `Length` for a payload of `payload_len` bytes, then the packet number.
fn put_length_and_pn<B: BufMut>(buf: &mut B, pn: PacketNumber, payload_len: usize) {
    let length = VarInt((pn.size() + payload_len) as u64);
    buf.encode_varint(&length, EncodeBytes::Two);
    buf.put_long_packet_number(pn);
}

impl<B: BufMut> WriteHeader<VersionNegotiationHeader> for B {
    fn put_header(&mut self, header: &VersionNegotiationHeader, _payload_len: usize) {
        put_long_prefix(self, 0x80, Version::NEGOTIATION, &header.dcid, &header.scid);
        for version in &header.versions {
            self.put_u32(version.0);
        }
    }
}

impl<B: BufMut> WriteHeader<RetryHeader> for B {
    fn put_header(&mut self, header: &RetryHeader, _payload_len: usize) {
        put_long_prefix(self, 0x80 | RETRY_TYPE, header.version, &header.dcid, &header.scid);
        let Some(odcil) = encode_cid_len(header.odcid.len()) else {
            panic!(
                "original destination connection ID of {} bytes does not fit a long header",
                header.odcid.len()
            );
        };
        self.put_u8(odcil);
        self.put_connection_id(&header.odcid);
        self.put_slice(&header.token);
    }
}

impl<B: BufMut> WriteHeader<InitialHeader> for B {
    fn put_header(&mut self, header: &InitialHeader, payload_len: usize) {
        put_long_prefix(self, 0x80 | INITIAL_TYPE, header.version, &header.dcid, &header.scid);
        self.put_varint(&VarInt(header.token.len() as u64));
        self.put_slice(&header.token);
        put_length_and_pn(self, header.pn, payload_len);
    }
}

impl<B: BufMut> WriteHeader<HandshakeHeader> for B {
    fn put_header(&mut self, header: &HandshakeHeader, payload_len: usize) {
        put_long_prefix(self, 0x80 | HANDSHAKE_TYPE, header.version, &header.dcid, &header.scid);
        put_length_and_pn(self, header.pn, payload_len);
    }
}

impl<B: BufMut> WriteHeader<ZeroRttHeader> for B {
    fn put_header(&mut self, header: &ZeroRttHeader, payload_len: usize) {
        put_long_prefix(self, 0x80 | ZERO_RTT_TYPE, header.version, &header.dcid, &header.scid);
        put_length_and_pn(self, header.pn, payload_len);
    }
}
