// MAX_DATA Frame {
//   Type (i) = 0x10,
//   Maximum Data (i),
// }

use nom::{Parser, combinator::map};

use super::{BeFrame, FrameType};
use crate::varint::{VarInt, WriteVarInt, be_varint};

/// Raises the connection level flow control limit of the peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaxDataFrame {
    max_data: VarInt,
}

const MAX_DATA_FRAME_TYPE: u8 = 0x10;

impl BeFrame for MaxDataFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::MaxData
    }

    fn encoding_size(&self) -> usize {
        1 + self.max_data.encoding_size()
    }
}

impl MaxDataFrame {
    pub fn new(max_data: VarInt) -> Self {
        Self { max_data }
    }

    pub fn max_data(&self) -> u64 {
        self.max_data.into_inner()
    }
}

pub fn be_max_data_frame(input: &[u8]) -> nom::IResult<&[u8], MaxDataFrame> {
    map(be_varint, MaxDataFrame::new).parse(input)
}

impl<T: bytes::BufMut> super::io::WriteFrame<MaxDataFrame> for T {
    fn put_frame(&mut self, frame: &MaxDataFrame) {
        self.put_u8(MAX_DATA_FRAME_TYPE);
        self.put_varint(&frame.max_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::io::WriteFrame;

    #[test]
    fn test_read_max_data_frame() {
        let buf = [0x52, 0x34];
        let (remain, frame) = be_max_data_frame(&buf).unwrap();
        assert!(remain.is_empty());
        assert_eq!(frame.max_data(), 0x1234);
    }

    #[test]
    fn test_write_max_data_frame() {
        let mut buf = Vec::new();
        let frame = MaxDataFrame::new(VarInt::from_u32(0x1234));
        buf.put_frame(&frame);
        assert_eq!(buf, [MAX_DATA_FRAME_TYPE, 0x52, 0x34]);
        assert_eq!(frame.encoding_size(), buf.len());
    }
}
