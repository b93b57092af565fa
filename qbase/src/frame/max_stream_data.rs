// MAX_STREAM_DATA Frame {
//   Type (i) = 0x11,
//   Stream ID (i),
//   Maximum Stream Data (i),
// }

use nom::{Parser, combinator::map, sequence::pair};

use super::{BeFrame, FrameType};
use crate::{
    sid::{StreamId, WriteStreamId, be_streamid},
    varint::{VarInt, WriteVarInt, be_varint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxStreamDataFrame {
    stream_id: StreamId,
    max_stream_data: VarInt,
}

const MAX_STREAM_DATA_FRAME_TYPE: u8 = 0x11;

impl BeFrame for MaxStreamDataFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::MaxStreamData
    }

    fn encoding_size(&self) -> usize {
        1 + self.stream_id.encoding_size() + self.max_stream_data.encoding_size()
    }
}

impl MaxStreamDataFrame {
    pub fn new(stream_id: StreamId, max_stream_data: VarInt) -> Self {
        Self {
            stream_id,
            max_stream_data,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn max_stream_data(&self) -> u64 {
        self.max_stream_data.into_inner()
    }
}

pub fn be_max_stream_data_frame(input: &[u8]) -> nom::IResult<&[u8], MaxStreamDataFrame> {
    map(pair(be_streamid, be_varint), |(stream_id, max_stream_data)| {
        MaxStreamDataFrame::new(stream_id, max_stream_data)
    })
    .parse(input)
}

impl<T: bytes::BufMut> super::io::WriteFrame<MaxStreamDataFrame> for T {
    fn put_frame(&mut self, frame: &MaxStreamDataFrame) {
        self.put_u8(MAX_STREAM_DATA_FRAME_TYPE);
        self.put_streamid(&frame.stream_id);
        self.put_varint(&frame.max_stream_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::io::WriteFrame;

    #[test]
    fn test_read_max_stream_data_frame() {
        let buf = [0x52, 0x34, 0x80, 0, 0x56, 0x78];
        let (remain, frame) = be_max_stream_data_frame(&buf).unwrap();
        assert!(remain.is_empty());
        assert_eq!(frame.stream_id(), StreamId::from(0x1234u32));
        assert_eq!(frame.max_stream_data(), 0x5678);
    }

    #[test]
    fn test_write_max_stream_data_frame() {
        let mut buf = Vec::new();
        let frame = MaxStreamDataFrame::new(StreamId::from(0x1234u32), VarInt::from_u32(0x5678));
        buf.put_frame(&frame);
        assert_eq!(buf, [MAX_STREAM_DATA_FRAME_TYPE, 0x52, 0x34, 0x80, 0, 0x56, 0x78]);
        assert_eq!(frame.encoding_size(), buf.len());
    }
}
