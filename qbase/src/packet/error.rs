use thiserror::Error;

/// Errors parsing a packet header.
///
/// A truncated datagram is always [`Error::UnexpectedEnd`], whichever field
/// it ended in, so that callers can tell it apart from a malformed one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unexpected EOF")]
    UnexpectedEnd,
    #[error("InvalidPacketHeader: {0}")]
    InvalidPacketHeader(String),
    #[error("InvalidVersionNegotiationPacket: {0}")]
    InvalidVersionNegotiationPacket(String),
}

/// Only the streaming parsers are used on packet headers, they fail with
/// [`nom::Err::Incomplete`] when the input is short, and none of them fails
/// for any other reason.
impl<I> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(_: nom::Err<nom::error::Error<I>>) -> Self {
        Error::UnexpectedEnd
    }
}
