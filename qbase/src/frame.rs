use bytes::{Buf, Bytes};
use enum_dispatch::enum_dispatch;

use crate::varint::VarInt;

mod ack;
mod connection_close;
mod crypto;
mod max_data;
mod max_stream_data;
mod padding;
mod ping;
mod reset_stream;
mod stop_sending;
mod stream;

/// Error module for parsing frames
pub mod error;
/// IO module for frame encoding and decoding
pub mod io;
/// Which frames must be resent once the packet carrying them is lost
pub mod retransmittable;

pub use ack::AckFrame;
pub use connection_close::ConnectionCloseFrame;
pub use crypto::CryptoFrame;
#[doc(hidden)]
pub use error::Error;
pub use max_data::MaxDataFrame;
pub use max_stream_data::MaxStreamDataFrame;
pub use padding::PaddingFrame;
pub use ping::PingFrame;
pub use reset_stream::ResetStreamFrame;
pub use retransmittable::{any_retransmittable, filter_retransmittable, is_retransmittable};
pub use stop_sending::StopSendingFrame;
pub use stream::StreamFrame;

/// Define the basic behaviors for all kinds of frames
#[enum_dispatch]
pub trait BeFrame {
    /// Return the type of frame
    fn frame_type(&self) -> FrameType;

    /// Return the exact number of bytes needed to encode this frame,
    /// including the data it carries if any.
    fn encoding_size(&self) -> usize {
        1
    }
}

/// The frame types this implementation reads and writes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameType {
    Padding,
    Ping,
    /// The bit is the ECN flag.
    Ack(u8),
    ResetStream,
    StopSending,
    Crypto,
    /// The bits are the OFF, LEN and FIN flags.
    Stream(u8),
    MaxData,
    MaxStreamData,
    /// 0 for the transport layer, 1 for the application layer.
    ConnectionClose(u8),
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(frame_type: u8) -> Result<Self, Self::Error> {
        Ok(match frame_type {
            0x00 => FrameType::Padding,
            0x01 => FrameType::Ping,
            ty @ (0x02 | 0x03) => FrameType::Ack(ty & 0b1),
            0x04 => FrameType::ResetStream,
            0x05 => FrameType::StopSending,
            0x06 => FrameType::Crypto,
            ty @ 0x08..=0x0f => FrameType::Stream(ty & 0b111),
            0x10 => FrameType::MaxData,
            0x11 => FrameType::MaxStreamData,
            ty @ (0x1c | 0x1d) => FrameType::ConnectionClose(ty & 0b1),
            _ => return Err(Error::InvalidType(VarInt::from(frame_type))),
        })
    }
}

impl From<FrameType> for u8 {
    fn from(frame_type: FrameType) -> Self {
        match frame_type {
            FrameType::Padding => 0x00,
            FrameType::Ping => 0x01,
            FrameType::Ack(ecn) => 0x02 | ecn,
            FrameType::ResetStream => 0x04,
            FrameType::StopSending => 0x05,
            FrameType::Crypto => 0x06,
            FrameType::Stream(flag) => 0x08 | flag,
            FrameType::MaxData => 0x10,
            FrameType::MaxStreamData => 0x11,
            FrameType::ConnectionClose(layer) => 0x1c | layer,
        }
    }
}

/// Parse the frame type from the input buffer,
/// [nom](https://docs.rs/nom/latest/nom/) parser style.
pub fn be_frame_type(input: &[u8]) -> nom::IResult<&[u8], FrameType, Error> {
    let (remain, frame_type) = nom::number::complete::be_u8(input)
        .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| nom::Err::Error(Error::IncompleteType))?;
    let frame_type = FrameType::try_from(frame_type).map_err(nom::Err::Error)?;
    Ok((remain, frame_type))
}

/// Sum type of the frames that control a single stream.
#[derive(Debug, Clone, Eq, PartialEq)]
#[enum_dispatch(BeFrame)]
pub enum StreamCtlFrame {
    ResetStream(ResetStreamFrame),
    StopSending(StopSendingFrame),
    MaxStreamData(MaxStreamDataFrame),
}

/// Sum type of all the frames.
///
/// The data frames' body are stored in the second field.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Frame {
    Padding(PaddingFrame),
    Ping(PingFrame),
    Ack(AckFrame),
    Close(ConnectionCloseFrame),
    MaxData(MaxDataFrame),
    StreamCtl(StreamCtlFrame),
    Stream(StreamFrame, Bytes),
    Crypto(CryptoFrame, Bytes),
}

impl BeFrame for Frame {
    fn frame_type(&self) -> FrameType {
        match self {
            Frame::Padding(f) => f.frame_type(),
            Frame::Ping(f) => f.frame_type(),
            Frame::Ack(f) => f.frame_type(),
            Frame::Close(f) => f.frame_type(),
            Frame::MaxData(f) => f.frame_type(),
            Frame::StreamCtl(f) => f.frame_type(),
            Frame::Stream(f, _) => f.frame_type(),
            Frame::Crypto(f, _) => f.frame_type(),
        }
    }

    fn encoding_size(&self) -> usize {
        match self {
            Frame::Padding(f) => f.encoding_size(),
            Frame::Ping(f) => f.encoding_size(),
            Frame::Ack(f) => f.encoding_size(),
            Frame::Close(f) => f.encoding_size(),
            Frame::MaxData(f) => f.encoding_size(),
            Frame::StreamCtl(f) => f.encoding_size(),
            Frame::Stream(f, _) => f.encoding_size(),
            Frame::Crypto(f, _) => f.encoding_size(),
        }
    }
}

impl From<StreamCtlFrame> for Frame {
    fn from(frame: StreamCtlFrame) -> Self {
        Frame::StreamCtl(frame)
    }
}

/// Reads frames from a packet payload until it is exhausted.
///
/// After the first error, the reader yields nothing more.
pub struct FrameReader {
    payload: Bytes,
}

impl FrameReader {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }
}

impl Iterator for FrameReader {
    type Item = Result<Frame, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.payload.is_empty() {
            return None;
        }

        match io::be_frame(&self.payload) {
            Ok((consumed, frame)) => {
                self.payload.advance(consumed);
                Some(Ok(frame))
            }
            Err(e) => {
                self.payload.clear();
                Some(Err(e))
            }
        }
    }
}
