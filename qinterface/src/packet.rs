use std::net::SocketAddr;

use bytes::Bytes;
use qbase::packet::{Header, InvariantHeader};
use tokio::time::Instant;

use crate::router::Error;

/// A packet routed to a connection, its header parsed, its payload still
/// sealed.
#[derive(Debug, Clone)]
pub struct ReceivedPacket {
    pub remote: SocketAddr,
    pub header: Header,
    /// The encoded header, packet number included, which the payload is
    /// authenticated with.
    pub raw_header: Bytes,
    /// What follows the packet number. For long headers with a `Length`
    /// field it is cut to that length, coalesced packets behind it are
    /// dropped.
    pub payload: Bytes,
    pub rcvd_time: Instant,
}

impl ReceivedPacket {
    /// Parse the rest of the header following `invariant`, and cut the
    /// payload to the `Length` field if there is one.
    pub(crate) fn parse(
        remote: SocketAddr,
        invariant: InvariantHeader,
        datagram: &Bytes,
        rcvd_time: Instant,
    ) -> Result<Self, Error> {
        let start = invariant.len();
        let (remain, header) =
            Header::parse(invariant, &datagram[start..]).map_err(Error::Header)?;
        let header_len = datagram.len() - remain.len();

        let payload_len = match (header.length(), header.packet_number()) {
            (Some(length), Some(pn)) => {
                let length = length.into_inner();
                let pn_size = pn.size() as u64;
                if length < pn_size {
                    return Err(Error::LengthShorterThanPacketNumber { length, pn_size });
                }
                let actual = (remain.len() + pn.size()) as u64;
                if actual < length {
                    return Err(Error::PacketTooShort {
                        actual,
                        expected: length,
                    });
                }
                (length - pn_size) as usize
            }
            _ => remain.len(),
        };

        Ok(Self {
            remote,
            header,
            raw_header: datagram.slice(..header_len),
            payload: datagram.slice(header_len..header_len + payload_len),
            rcvd_time,
        })
    }
}
