// CRYPTO Frame {
//   Type (i) = 0x06,
//   Offset (i),
//   Length (i),
//   Crypto Data (..),
// }

use std::ops::Range;

use nom::{Parser, sequence::pair};

use super::{BeFrame, FrameType};
use crate::varint::{VARINT_MAX, VarInt, WriteVarInt, be_varint};

/// The header of a CRYPTO frame, its data is kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoFrame {
    offset: VarInt,
    length: VarInt,
}

const CRYPTO_FRAME_TYPE: u8 = 0x06;

impl BeFrame for CryptoFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::Crypto
    }

    fn encoding_size(&self) -> usize {
        1 + self.offset.encoding_size()
            + self.length.encoding_size()
            + self.length.into_inner() as usize
    }
}

impl CryptoFrame {
    /// Panics if the end of the data exceeds 2^62 - 1.
    pub fn new(offset: u64, length: usize) -> Self {
        assert!(offset + length as u64 <= VARINT_MAX);
        Self {
            offset: VarInt(offset),
            length: VarInt(length as u64),
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset.into_inner()
    }

    pub fn len(&self) -> usize {
        self.length.into_inner() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length.into_inner() == 0
    }

    pub fn range(&self) -> Range<u64> {
        self.offset()..self.offset() + self.length.into_inner()
    }

    /// How many bytes of crypto data at `offset` a frame can carry within
    /// `capacity` bytes, `None` if not even one byte fits.
    pub fn estimate_max_capacity(capacity: usize, offset: u64) -> Option<usize> {
        let header = 1 + VarInt(offset).encoding_size();
        // the Length field grows with the data
        [1usize, 2, 4, 8].into_iter().find_map(|len_size| {
            let data = capacity.checked_sub(header + len_size)?;
            (data > 0 && VarInt(data as u64).encoding_size() <= len_size).then_some(data)
        })
    }
}

pub fn be_crypto_frame(input: &[u8]) -> nom::IResult<&[u8], CryptoFrame> {
    let (remain, (offset, length)) = pair(be_varint, be_varint).parse(input)?;
    if offset.into_inner() + length.into_inner() > VARINT_MAX {
        return Err(nom::Err::Error(nom::error::make_error(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    Ok((remain, CryptoFrame { offset, length }))
}

/// Writes the frame header only, the data must follow right after it.
impl<T: bytes::BufMut> super::io::WriteFrame<CryptoFrame> for T {
    fn put_frame(&mut self, frame: &CryptoFrame) {
        self.put_u8(CRYPTO_FRAME_TYPE);
        self.put_varint(&frame.offset);
        self.put_varint(&frame.length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::io::WriteDataFrame;

    #[test]
    fn test_read_crypto_frame() {
        let buf = [0x52, 0x34, 0x80, 0x00, 0x56, 0x78];
        let (remain, frame) = be_crypto_frame(&buf).unwrap();
        assert!(remain.is_empty());
        assert_eq!(frame.offset(), 0x1234);
        assert_eq!(frame.len(), 0x5678);
    }

    #[test]
    fn test_read_too_large_crypto_frame() {
        let buf = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01];
        assert!(matches!(
            be_crypto_frame(&buf),
            Err(nom::Err::Error(e)) if e.code == nom::error::ErrorKind::TooLarge
        ));
    }

    #[test]
    fn test_write_crypto_frame() {
        let mut buf = Vec::new();
        let frame = CryptoFrame::new(0x1234, 5);
        buf.put_data_frame(&frame, b"hello");
        assert_eq!(
            buf,
            [CRYPTO_FRAME_TYPE, 0x52, 0x34, 0x05, b'h', b'e', b'l', b'l', b'o']
        );
        assert_eq!(frame.encoding_size(), buf.len());
    }

    #[test]
    fn test_estimate_max_capacity() {
        assert_eq!(CryptoFrame::estimate_max_capacity(3, 0), None);
        assert_eq!(CryptoFrame::estimate_max_capacity(4, 0), Some(1));
        // 1 type + 1 offset + 2 length + 100 data
        let capacity = CryptoFrame::estimate_max_capacity(104, 0).unwrap();
        assert_eq!(capacity, 100);
        assert_eq!(CryptoFrame::new(0, capacity).encoding_size(), 104);
    }
}
