// PING Frame {
//   Type (i) = 0x01,
// }

use super::{BeFrame, FrameType};

/// The frame a packet carries only to be retransmittable, eliciting an ACK.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingFrame;

const PING_FRAME_TYPE: u8 = 0x01;

impl BeFrame for PingFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::Ping
    }
}

impl<T: bytes::BufMut> super::io::WriteFrame<PingFrame> for T {
    fn put_frame(&mut self, _frame: &PingFrame) {
        self.put_u8(PING_FRAME_TYPE);
    }
}
