// STREAM Frame {
//   Type (i) = 0x08..0x0f,
//   Stream ID (i),
//   [Offset (i)],
//   [Length (i)],
//   Stream Data (..),
// }
// - OFF bit: 0x04
// - LEN bit: 0x02
// - FIN bit: 0x01

use std::ops::Range;

use super::{BeFrame, FrameType};
use crate::{
    sid::{StreamId, WriteStreamId, be_streamid},
    varint::{VARINT_MAX, VarInt, WriteVarInt, be_varint},
};

/// The header of a STREAM frame, its data is kept apart.
///
/// The OFF bit is derived from the offset when writing, only the LEN and FIN
/// bits are remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFrame {
    pub id: StreamId,
    pub offset: VarInt,
    pub length: usize,
    flag: u8,
}

const STREAM_FRAME_TYPE: u8 = 0x08;

const OFF_BIT: u8 = 0x04;
const LEN_BIT: u8 = 0x02;
const FIN_BIT: u8 = 0x01;

impl BeFrame for StreamFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::Stream(self.type_bits())
    }

    fn encoding_size(&self) -> usize {
        self.header_size() + self.length
    }
}

impl StreamFrame {
    /// A frame without FIN and without an explicit length.
    ///
    /// Panics if the end of the data exceeds 2^62 - 1.
    pub fn new(id: StreamId, offset: u64, length: usize) -> Self {
        assert!(offset + length as u64 <= VARINT_MAX);
        Self {
            id,
            offset: VarInt(offset),
            length,
            flag: 0,
        }
    }

    fn type_bits(&self) -> u8 {
        if self.offset.into_inner() != 0 {
            self.flag | OFF_BIT
        } else {
            self.flag
        }
    }

    /// The encoding size without the data.
    pub fn header_size(&self) -> usize {
        1 + self.id.encoding_size()
            + if self.offset.into_inner() != 0 {
                self.offset.encoding_size()
            } else {
                0
            }
            + if self.has_length() {
                VarInt(self.length as u64).encoding_size()
            } else {
                0
            }
    }

    pub fn is_fin(&self) -> bool {
        self.flag & FIN_BIT != 0
    }

    pub fn range(&self) -> Range<u64> {
        self.offset.into_inner()..self.offset.into_inner() + self.length as u64
    }

    pub fn set_eos_flag(&mut self, is_eos: bool) {
        if is_eos {
            self.flag |= FIN_BIT;
        } else {
            self.flag &= !FIN_BIT;
        }
    }

    /// Whether the data length is written explicitly.
    ///
    /// Only the last frame of a packet may go without it, its data then
    /// extends to the end of the packet.
    pub fn has_length(&self) -> bool {
        self.flag & LEN_BIT != 0
    }

    pub fn carry_length(&mut self) {
        self.flag |= LEN_BIT;
    }

    pub fn strip_length(&mut self) {
        self.flag &= !LEN_BIT;
    }

    /// Split the frame into two, the first one carrying `at` bytes of data.
    ///
    /// The offset ranges of the two halves are contiguous. Only the second
    /// half keeps the FIN bit, both keep the LEN bit as it was.
    ///
    /// Panics if `at` is not inside the data.
    pub fn split_at(&self, at: usize) -> (StreamFrame, StreamFrame) {
        assert!(at > 0 && at < self.length);
        let head = StreamFrame {
            id: self.id,
            offset: self.offset,
            length: at,
            flag: self.flag & !FIN_BIT,
        };
        let tail = StreamFrame {
            id: self.id,
            offset: VarInt(self.offset.into_inner() + at as u64),
            length: self.length - at,
            flag: self.flag,
        };
        (head, tail)
    }

    /// How many bytes of data a frame without explicit length can carry
    /// within `capacity` bytes, `None` if not even one byte fits.
    pub fn estimate_max_capacity(capacity: usize, sid: StreamId, offset: u64) -> Option<usize> {
        assert!(offset <= VARINT_MAX);
        let mut least = 1 + sid.encoding_size();
        if offset != 0 {
            least += VarInt(offset).encoding_size();
        }
        if capacity <= least {
            None
        } else {
            Some(capacity - least)
        }
    }
}

/// Parse a STREAM frame header whose type carried the given bits.
///
/// Without the LEN bit, the data runs to the end of the input.
pub fn stream_frame_with_flag(flag: u8) -> impl Fn(&[u8]) -> nom::IResult<&[u8], StreamFrame> {
    move |input| {
        let (remain, id) = be_streamid(input)?;
        let (remain, offset) = if flag & OFF_BIT != 0 {
            be_varint(remain)?
        } else {
            (remain, VarInt::default())
        };
        let (remain, length) = if flag & LEN_BIT != 0 {
            let (remain, length) = be_varint(remain)?;
            (remain, length.into_inner() as usize)
        } else {
            (remain, remain.len())
        };
        if offset.into_inner() + length as u64 > VARINT_MAX {
            return Err(nom::Err::Error(nom::error::make_error(
                input,
                nom::error::ErrorKind::TooLarge,
            )));
        }
        Ok((
            remain,
            StreamFrame {
                id,
                offset,
                length,
                flag: flag & (LEN_BIT | FIN_BIT),
            },
        ))
    }
}

/// Writes the frame header only, the data must follow right after it.
impl<T: bytes::BufMut> super::io::WriteFrame<StreamFrame> for T {
    fn put_frame(&mut self, frame: &StreamFrame) {
        self.put_u8(STREAM_FRAME_TYPE | frame.type_bits());
        self.put_streamid(&frame.id);
        if frame.offset.into_inner() != 0 {
            self.put_varint(&frame.offset);
        }
        if frame.has_length() {
            self.put_varint(&VarInt(frame.length as u64));
        }
    }
}
