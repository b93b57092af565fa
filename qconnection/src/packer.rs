use std::{collections::VecDeque, net::SocketAddr, sync::Arc};

use bytes::{BufMut, Bytes, BytesMut};
use derive_builder::Builder;
use getset::{CopyGetters, Getters};
use qbase::{
    cid::ConnectionId,
    frame::{
        BeFrame, ConnectionCloseFrame, Frame, PingFrame, StreamFrame, any_retransmittable,
        filter_retransmittable, io::WriteFrame,
    },
    packet::{
        DEFAULT_MAX_PACKET_SIZE, EncodeHeader, EncryptionLevel, Header, LongHeaderBuilder,
        MAX_PACKET_SIZE_IPV4, MAX_PACKET_SIZE_IPV6, MIN_INITIAL_PACKET_SIZE, OneRttHeader,
        PacketNumber, WriteHeader,
    },
    param::TransportParameters,
    role::Role,
    varint::VarInt,
    version::Version,
};
use thiserror::Error;

use crate::{
    sealer::{Sealer, SealingManager},
    source::{AckFrameSource, CryptoStream, FrameSource, PacketNumberTracker},
};

/// Packets without a retransmittable frame sent in a row before a PING is
/// added, so that the peer acknowledges eventually.
pub const MAX_NON_RETRANSMITTABLE_ACKS: usize = 19;

/// A STREAM frame is only started when at least this many bytes are left in
/// a retransmitted packet.
const MIN_STREAM_FRAME_SIZE: usize = 128;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no keys available at the {0} level")]
    KeysUnavailable(EncryptionLevel),
    #[error("PacketPacker BUG: packet too large ({size} bytes, allowed {allowed} bytes)")]
    PacketTooLarge { size: usize, allowed: usize },
    #[error("PacketPacker BUG: Peeked and Popped packet numbers do not match")]
    PacketNumberMismatch { peeked: u64, popped: u64 },
    #[error("failed to seal packet: {0}")]
    Seal(#[from] rustls::Error),
}

#[derive(Builder, Getters, CopyGetters, Debug, Clone, PartialEq, Eq)]
#[builder(setter(into))]
pub struct PackerConfig {
    #[getset(get_copy = "pub")]
    role: Role,
    #[getset(get_copy = "pub")]
    version: Version,
    #[getset(get_copy = "pub")]
    scid: ConnectionId,
    #[getset(get_copy = "pub")]
    dcid: ConnectionId,
    /// The address validation token, sent in every Initial of a client.
    #[builder(default)]
    #[getset(get = "pub")]
    token: Bytes,
    /// Decides the maximum packet size until the peer's transport parameters
    /// lower it.
    #[builder(default, setter(strip_option))]
    #[getset(get_copy = "pub")]
    peer_addr: Option<SocketAddr>,
    #[builder(default = "MAX_NON_RETRANSMITTABLE_ACKS")]
    #[getset(get_copy = "pub")]
    max_non_retransmittable_acks: usize,
}

/// Everything the packer pulls frames, packet numbers and keys from.
#[derive(Clone)]
pub struct PackerSources {
    pub initial_stream: Arc<dyn CryptoStream>,
    pub handshake_stream: Arc<dyn CryptoStream>,
    pub sealing: Arc<dyn SealingManager>,
    pub pn_tracker: Arc<dyn PacketNumberTracker>,
    pub frames: Arc<dyn FrameSource>,
    pub acks: Arc<dyn AckFrameSource>,
}

/// A sealed packet, ready to be sent, and what the loss detection needs to
/// know about it.
#[derive(Debug, Clone)]
pub struct PackedPacket {
    pub header: Header,
    pub raw: Bytes,
    pub frames: Vec<Frame>,
    pub level: EncryptionLevel,
    pub pn: u64,
}

/// The largest datagram to send to `peer`, [`DEFAULT_MAX_PACKET_SIZE`] if
/// its address family is not known yet.
pub fn max_packet_size_for(peer: Option<SocketAddr>) -> usize {
    match peer {
        Some(SocketAddr::V4(_)) => MAX_PACKET_SIZE_IPV4,
        Some(SocketAddr::V6(_)) => MAX_PACKET_SIZE_IPV6,
        None => DEFAULT_MAX_PACKET_SIZE,
    }
}

/// Assembles the outgoing packets of one connection.
///
/// The packer is driven by the single send task of its connection, every
/// method returns promptly. "Nothing to send" is `Ok(None)`, never an error,
/// and consumes no packet number.
pub struct Packer {
    role: Role,
    version: Version,
    scid: ConnectionId,
    dcid: ConnectionId,
    token: Bytes,
    max_packet_size: usize,
    max_non_retransmittable_acks: usize,
    non_retransmittable_acks: usize,
    sources: PackerSources,
}

impl Packer {
    pub fn new(config: PackerConfig, sources: PackerSources) -> Self {
        Self {
            role: config.role,
            version: config.version,
            scid: config.scid,
            dcid: config.dcid,
            max_packet_size: max_packet_size_for(config.peer_addr),
            max_non_retransmittable_acks: config.max_non_retransmittable_acks,
            token: config.token,
            non_retransmittable_acks: 0,
            sources,
        }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Lower the maximum packet size to what the peer accepts, it never grows.
    pub fn handle_transport_parameters(&mut self, params: &TransportParameters) {
        let peer_max = usize::try_from(params.max_packet_size()).unwrap_or(usize::MAX);
        if peer_max < self.max_packet_size {
            tracing::debug!(
                from = self.max_packet_size,
                to = peer_max,
                "lowered max packet size"
            );
            self.max_packet_size = peer_max;
        }
    }

    pub fn change_dest_connection_id(&mut self, dcid: ConnectionId) {
        self.dcid = dcid;
    }

    /// Pack the next packet: pending crypto data first, otherwise an ACK,
    /// control frames and, at 1-RTT, stream frames.
    pub fn pack_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        if let Some(packet) = self.maybe_pack_crypto_packet()? {
            return Ok(Some(packet));
        }

        let Some((level, sealer)) = self.sources.sealing.get_sealer() else {
            return Ok(None);
        };
        let (header, pn) = self.header(level);
        let max_len = self
            .max_packet_size
            .saturating_sub(header.size() + sealer.overhead());

        let mut frames = Vec::new();
        let mut len = 0;
        if let Some(ack) = self.sources.acks.get_ack_frame() {
            len += ack.encoding_size();
            frames.push(Frame::Ack(ack));
        }
        len += self
            .sources
            .frames
            .append_control_frames(&mut frames, max_len.saturating_sub(len));
        if level == EncryptionLevel::OneRtt && len < max_len {
            // the last STREAM frame sheds its data length field, at least one byte
            self.sources
                .frames
                .append_stream_frames(&mut frames, max_len - len + 1);
        }
        if frames.is_empty() {
            return Ok(None);
        }

        self.ensure_retransmittable(&mut frames);
        self.write_and_seal(header, frames, level, sealer.as_ref(), pn)
            .map(Some)
    }

    /// Pack a packet carrying nothing but an ACK frame, if there is one.
    pub fn maybe_pack_ack_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        let Some((level, sealer)) = self.sources.sealing.get_sealer() else {
            return Ok(None);
        };
        let Some(ack) = self.sources.acks.get_ack_frame() else {
            return Ok(None);
        };
        let (header, pn) = self.header(level);
        self.write_and_seal(header, vec![Frame::Ack(ack)], level, sealer.as_ref(), pn)
            .map(Some)
    }

    /// Pack `frame` alone at the current encryption level, the last packet of
    /// the connection.
    pub fn pack_connection_close(
        &mut self,
        frame: ConnectionCloseFrame,
    ) -> Result<PackedPacket, Error> {
        let (level, sealer) = self
            .sources
            .sealing
            .get_sealer()
            .ok_or(Error::KeysUnavailable(EncryptionLevel::Initial))?;
        let (header, pn) = self.header(level);
        self.write_and_seal(header, vec![Frame::Close(frame)], level, sealer.as_ref(), pn)
    }

    /// Pack the retransmittable frames of a lost packet again, at the level
    /// it was sent at.
    ///
    /// The header type follows `level`, whatever type the lost packet had.
    /// Below 1-RTT the frames go into a single packet, as the original one
    /// did. At 1-RTT the frames are spread over as many packets as needed,
    /// control frames first, splitting STREAM frames that do not fit.
    ///
    /// A frame that fits no packet is rejected before any packet number is
    /// consumed. Should sealing fail halfway, the packets sealed so far are
    /// dropped with their packet numbers, the connection can not go on
    /// anyway.
    pub fn pack_retransmission(
        &mut self,
        level: EncryptionLevel,
        frames: Vec<Frame>,
    ) -> Result<Vec<PackedPacket>, Error> {
        let frames = filter_retransmittable(frames);
        if frames.is_empty() {
            return Ok(Vec::new());
        }
        let sealer = self
            .sources
            .sealing
            .get_sealer_with_level(level)
            .ok_or(Error::KeysUnavailable(level))?;

        if level != EncryptionLevel::OneRtt {
            let (header, pn) = self.header(level);
            let packet = self.write_and_seal(header, frames, level, sealer.as_ref(), pn)?;
            return Ok(vec![packet]);
        }

        let mut controls = VecDeque::new();
        let mut streams = VecDeque::new();
        for frame in frames {
            match frame {
                Frame::Stream(frame, data) => streams.push_back((frame, data)),
                frame => controls.push_back(frame),
            }
        }
        self.check_retransmission_fits(&controls, &streams, sealer.as_ref())?;

        let mut packets = Vec::new();
        while !controls.is_empty() || !streams.is_empty() {
            let (header, pn) = self.header(level);
            let max_len = self
                .max_packet_size
                .saturating_sub(header.size() + sealer.overhead());

            let mut frames = Vec::new();
            let mut len = 0;
            while let Some(frame) = controls.front() {
                if len + frame.encoding_size() > max_len {
                    break;
                }
                len += frame.encoding_size();
                frames.extend(controls.pop_front());
            }

            while frames.is_empty() || len + MIN_STREAM_FRAME_SIZE < max_len {
                let Some((mut frame, data)) = streams.pop_front() else {
                    break;
                };
                frame.carry_length();
                let room = max_len - len;
                if frame.encoding_size() <= room {
                    len += frame.encoding_size();
                    frames.push(Frame::Stream(frame, data));
                    continue;
                }

                // fill the rest of the packet, the frame being the last one
                frame.strip_length();
                let offset = frame.offset.into_inner();
                match StreamFrame::estimate_max_capacity(room, frame.id, offset) {
                    Some(n) if n >= frame.length => frames.push(Frame::Stream(frame, data)),
                    Some(n) => {
                        let (head, tail) = frame.split_at(n);
                        frames.push(Frame::Stream(head, data.slice(..n)));
                        streams.push_front((tail, data.slice(n..)));
                    }
                    None => streams.push_front((frame, data)),
                }
                break;
            }

            if frames.is_empty() {
                // the packet number grew longer since the check, rejected when sealing
                match controls.pop_front() {
                    Some(frame) => frames.push(frame),
                    None => frames.extend(streams.pop_front().map(|(f, d)| Frame::Stream(f, d))),
                }
            }
            packets.push(self.write_and_seal(header, frames, level, sealer.as_ref(), pn)?);
        }
        Ok(packets)
    }

    /// Every control frame must fit a 1-RTT packet on its own, and every
    /// STREAM frame must leave room for at least one byte of data.
    fn check_retransmission_fits(
        &self,
        controls: &VecDeque<Frame>,
        streams: &VecDeque<(StreamFrame, Bytes)>,
        sealer: &dyn Sealer,
    ) -> Result<(), Error> {
        let (header, _) = self.header(EncryptionLevel::OneRtt);
        let overhead = header.size() + sealer.overhead();
        let max_len = self.max_packet_size.saturating_sub(overhead);
        let too_large = controls
            .iter()
            .map(|frame| frame.encoding_size())
            .find(|&size| size > max_len)
            .or_else(|| {
                streams
                    .iter()
                    .find(|(frame, _)| {
                        StreamFrame::estimate_max_capacity(
                            max_len,
                            frame.id,
                            frame.offset.into_inner(),
                        )
                        .is_none()
                    })
                    .map(|(frame, _)| frame.encoding_size())
            });
        match too_large {
            Some(size) => {
                let size = overhead + size;
                tracing::error!(size, allowed = self.max_packet_size, "frame fits no packet");
                Err(Error::PacketTooLarge {
                    size,
                    allowed: self.max_packet_size,
                })
            }
            None => Ok(()),
        }
    }

    fn maybe_pack_crypto_packet(&mut self) -> Result<Option<PackedPacket>, Error> {
        let (level, stream) = if self.sources.initial_stream.has_data() {
            (EncryptionLevel::Initial, self.sources.initial_stream.clone())
        } else if self.sources.handshake_stream.has_data() {
            (
                EncryptionLevel::Handshake,
                self.sources.handshake_stream.clone(),
            )
        } else {
            return Ok(None);
        };
        let sealer = self
            .sources
            .sealing
            .get_sealer_with_level(level)
            .ok_or(Error::KeysUnavailable(level))?;
        let (header, pn) = self.header(level);
        let max_len = self
            .max_packet_size
            .saturating_sub(header.size() + sealer.overhead());

        let mut frames = Vec::with_capacity(2);
        let mut len = 0;
        if let Some(ack) = self.sources.acks.get_ack_frame() {
            len += ack.encoding_size();
            frames.push(Frame::Ack(ack));
        }
        if let Some((frame, data)) = stream.pop_crypto_frame(max_len.saturating_sub(len)) {
            frames.push(Frame::Crypto(frame, data));
        }
        if frames.is_empty() {
            return Ok(None);
        }
        self.write_and_seal(header, frames, level, sealer.as_ref(), pn)
            .map(Some)
    }

    fn ensure_retransmittable(&mut self, frames: &mut Vec<Frame>) {
        if any_retransmittable(frames.iter()) {
            self.non_retransmittable_acks = 0;
        } else if self.non_retransmittable_acks >= self.max_non_retransmittable_acks {
            frames.push(Frame::Ping(PingFrame));
            self.non_retransmittable_acks = 0;
        } else {
            self.non_retransmittable_acks += 1;
        }
    }

    /// The header of the next packet at `level`, and the full packet number
    /// it was built with.
    fn header(&self, level: EncryptionLevel) -> (Header, u64) {
        let (pn, pn_len) = self.sources.pn_tracker.peek_packet_number();
        let encoded_pn = PacketNumber::new(pn, pn_len);
        let builder = LongHeaderBuilder::with_cid(self.version, self.dcid, self.scid);
        let header = match level {
            EncryptionLevel::Initial => {
                let token = match self.role {
                    Role::Client => self.token.clone(),
                    Role::Server => Bytes::new(),
                };
                Header::Initial(builder.initial(token, encoded_pn))
            }
            EncryptionLevel::Handshake => Header::Handshake(builder.handshake(encoded_pn)),
            EncryptionLevel::ZeroRtt => Header::ZeroRtt(builder.zero_rtt(encoded_pn)),
            EncryptionLevel::OneRtt => {
                Header::OneRtt(OneRttHeader::new(false, self.dcid, encoded_pn))
            }
        };
        (header, pn)
    }

    fn write_and_seal(
        &self,
        mut header: Header,
        mut frames: Vec<Frame>,
        level: EncryptionLevel,
        sealer: &dyn Sealer,
        pn: u64,
    ) -> Result<PackedPacket, Error> {
        for frame in frames.iter_mut() {
            if let Frame::Stream(frame, _) = frame {
                frame.carry_length();
            }
        }
        if let Some(Frame::Stream(frame, _)) = frames.last_mut() {
            frame.strip_length();
        }

        let header_len = header.size();
        let frames_len: usize = frames.iter().map(|frame| frame.encoding_size()).sum();
        let padding = match (self.role, &header) {
            (Role::Client, Header::Initial(_)) => MIN_INITIAL_PACKET_SIZE
                .saturating_sub(header_len + frames_len + sealer.overhead()),
            _ => 0,
        };
        let payload_len = frames_len + padding + sealer.overhead();
        let size = header_len + payload_len;
        if size > self.max_packet_size {
            tracing::error!(size, allowed = self.max_packet_size, %level, "packet too large");
            return Err(Error::PacketTooLarge {
                size,
                allowed: self.max_packet_size,
            });
        }
        if let Some(encoded_pn) = header.packet_number() {
            set_length(&mut header, encoded_pn.size() + payload_len);
        }

        let mut buf = BytesMut::with_capacity(size);
        buf.put_header(&header, payload_len);
        let header_len = buf.len();
        // PADDING frames are zero bytes, put in front of a length-less last STREAM frame
        buf.put_bytes(0, padding);
        for frame in &frames {
            buf.put_frame(frame);
        }
        sealer.seal(pn, &mut buf, header_len)?;

        let popped = self.sources.pn_tracker.pop_packet_number();
        if popped != pn {
            tracing::error!(peeked = pn, popped, "packet number changed while packing");
            return Err(Error::PacketNumberMismatch { peeked: pn, popped });
        }
        tracing::trace!(pn, %level, size = buf.len(), frames = frames.len(), "packed");
        Ok(PackedPacket {
            header,
            raw: buf.freeze(),
            frames,
            level,
            pn,
        })
    }
}

fn set_length(header: &mut Header, length: usize) {
    // bounded by the max packet size
    let length = VarInt::from_u32(length as u32);
    match header {
        Header::Initial(h) => h.specific.length = length,
        Header::Handshake(h) => h.specific.length = length,
        Header::ZeroRtt(h) => h.specific.length = length,
        _ => {}
    }
}
