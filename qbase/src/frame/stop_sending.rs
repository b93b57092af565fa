// STOP_SENDING Frame {
//   Type (i) = 0x05,
//   Stream ID (i),
//   Application Protocol Error Code (i),
// }

use nom::{Parser, combinator::map, sequence::pair};

use super::{BeFrame, FrameType};
use crate::{
    sid::{StreamId, WriteStreamId, be_streamid},
    varint::{VarInt, WriteVarInt, be_varint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopSendingFrame {
    stream_id: StreamId,
    app_err_code: VarInt,
}

const STOP_SENDING_FRAME_TYPE: u8 = 0x05;

impl BeFrame for StopSendingFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::StopSending
    }

    fn encoding_size(&self) -> usize {
        1 + self.stream_id.encoding_size() + self.app_err_code.encoding_size()
    }
}

impl StopSendingFrame {
    pub fn new(stream_id: StreamId, app_err_code: VarInt) -> Self {
        Self {
            stream_id,
            app_err_code,
        }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn app_err_code(&self) -> u64 {
        self.app_err_code.into_inner()
    }
}

pub fn be_stop_sending_frame(input: &[u8]) -> nom::IResult<&[u8], StopSendingFrame> {
    map(pair(be_streamid, be_varint), |(stream_id, app_err_code)| {
        StopSendingFrame::new(stream_id, app_err_code)
    })
    .parse(input)
}

impl<T: bytes::BufMut> super::io::WriteFrame<StopSendingFrame> for T {
    fn put_frame(&mut self, frame: &StopSendingFrame) {
        self.put_u8(STOP_SENDING_FRAME_TYPE);
        self.put_streamid(&frame.stream_id);
        self.put_varint(&frame.app_err_code);
    }
}
