//! What the packer pulls frames and packet numbers from.
//!
//! The collaborators may be shared with other tasks of the connection, the
//! streams or the loss detection, so they take `&self` and keep their own
//! locks. The packer itself never locks anything.
use bytes::Bytes;
use qbase::{
    frame::{AckFrame, CryptoFrame, Frame},
    packet::PacketNumberLen,
};

/// Hands out the packet numbers of one packet number space.
pub trait PacketNumberTracker: Send + Sync {
    /// The next packet number and the length it is encoded in, without
    /// consuming it.
    fn peek_packet_number(&self) -> (u64, PacketNumberLen);

    /// Consume the next packet number, the one last peeked.
    fn pop_packet_number(&self) -> u64;
}

/// Control and stream frames waiting to be sent.
pub trait FrameSource: Send + Sync {
    /// Append control frames of at most `max_len` bytes in total, returning
    /// how many bytes they take.
    fn append_control_frames(&self, frames: &mut Vec<Frame>, max_len: usize) -> usize;

    /// Append STREAM frames of at most `max_len` bytes in total, each of
    /// them counted with its data length field.
    fn append_stream_frames(&self, frames: &mut Vec<Frame>, max_len: usize);
}

pub trait AckFrameSource: Send + Sync {
    /// An ACK frame if there is anything new to acknowledge.
    fn get_ack_frame(&self) -> Option<AckFrame>;
}

/// The outgoing crypto stream of one encryption level.
pub trait CryptoStream: Send + Sync {
    fn has_data(&self) -> bool;

    /// Take a CRYPTO frame of at most `max_len` bytes, `None` if nothing
    /// fits.
    fn pop_crypto_frame(&self, max_len: usize) -> Option<(CryptoFrame, Bytes)>;
}
