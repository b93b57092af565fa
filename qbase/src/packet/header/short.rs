use bytes::BufMut;

use super::{EncodeHeader, GetDcid, WriteHeader};
use crate::{
    cid::{ConnectionId, WriteConnectionId},
    packet::{
        error::Error,
        number::{PacketNumber, PacketNumberLen, WritePacketNumber, take_pn_len},
    },
};

/// The fixed bits of a short header's first byte.
const SHORT_HEADER_BASE: u8 = 0x30;
const KEY_PHASE_BIT: u8 = 0x40;

/// The header of a 1-RTT packet.
///
/// A packet with a short header does not include a length, so it can only be
/// the last packet in a UDP datagram.
///
/// ```text
///   +---key phase bit
///   |
/// +-+-+-+-+-+-+-+-+----------------+-------------------+
/// |0|K|1|1|0|0|P P| DCID (0..160)  | Packet Number ... |
/// +-+-+-+-+-+-+-+-+----------------+-------------------+
///               |
///               +---> packet number length, 0/1/2 for 1/2/4 bytes
/// ```
///
/// The length of the destination connection ID is not on the wire, the
/// receiver knows the length of the connection IDs it issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneRttHeader {
    pub key_phase: bool,
    pub dcid: ConnectionId,
    pub pn: PacketNumber,
}

impl OneRttHeader {
    pub fn new(key_phase: bool, dcid: ConnectionId, pn: PacketNumber) -> Self {
        Self { key_phase, dcid, pn }
    }
}

impl EncodeHeader for OneRttHeader {
    fn size(&self) -> usize {
        1 + self.dcid.len() + self.pn.size()
    }
}

impl GetDcid for OneRttHeader {
    fn dcid(&self) -> &ConnectionId {
        &self.dcid
    }
}

/// Parse what follows the destination connection ID of a short header.
pub(super) fn be_one_rtt_rest(
    first_byte: u8,
    dcid: ConnectionId,
    input: &[u8],
) -> Result<(&[u8], OneRttHeader), Error> {
    let Some(pn_len) = PacketNumberLen::from_short_code(first_byte) else {
        return Err(Error::InvalidPacketHeader(format!(
            "invalid packet number length code {}",
            first_byte & 0x03
        )));
    };
    let (remain, pn) = take_pn_len(pn_len)(input)?;
    let key_phase = first_byte & KEY_PHASE_BIT != 0;
    Ok((remain, OneRttHeader::new(key_phase, dcid, pn)))
}

impl<B: BufMut> WriteHeader<OneRttHeader> for B {
    fn put_header(&mut self, header: &OneRttHeader, _payload_len: usize) {
        let mut first_byte = SHORT_HEADER_BASE | header.pn.len().short_code();
        if header.key_phase {
            first_byte |= KEY_PHASE_BIT;
        }
        self.put_u8(first_byte);
        self.put_connection_id(&header.dcid);
        self.put_packet_number(header.pn);
    }
}
