use super::Frame;

/// Whether a lost frame has to be sent again.
///
/// ACK frames are never resent, a newer ACK frame supersedes them. Every other
/// frame is.
pub fn is_retransmittable(frame: &Frame) -> bool {
    !matches!(frame, Frame::Ack(_))
}

/// The retransmittable frames of `frames`, in their original order.
pub fn filter_retransmittable(frames: impl IntoIterator<Item = Frame>) -> Vec<Frame> {
    frames.into_iter().filter(is_retransmittable).collect()
}

/// Whether a packet carrying `frames` elicits an acknowledgment.
pub fn any_retransmittable<'f>(frames: impl IntoIterator<Item = &'f Frame>) -> bool {
    frames.into_iter().any(is_retransmittable)
}
