// PADDING Frame {
//   Type (i) = 0x00,
// }

use super::{BeFrame, FrameType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddingFrame;

const PADDING_FRAME_TYPE: u8 = 0x00;

impl BeFrame for PaddingFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::Padding
    }
}

/// Each PADDING frame is a single zero byte, so a run of them is just zeros.
impl<T: bytes::BufMut> super::io::WriteFrame<PaddingFrame> for T {
    fn put_frame(&mut self, _frame: &PaddingFrame) {
        self.put_u8(PADDING_FRAME_TYPE);
    }
}
