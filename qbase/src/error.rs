use std::{borrow::Cow, fmt};

use thiserror::Error;

use crate::{
    frame::{ConnectionCloseFrame, FrameType},
    varint::VarInt,
};

/// QUIC transport error codes, carried by CONNECTION_CLOSE frames.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    None,
    Internal,
    ConnectionRefused,
    FlowControl,
    StreamLimit,
    StreamState,
    FinalSize,
    FrameEncoding,
    TransportParameter,
    ConnectionIdLimit,
    ProtocolViolation,
    InvalidToken,
    Application,
    CryptoBufferExceeded,
    Crypto(u8),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            Self::None => "no error",
            Self::Internal => "implementation error",
            Self::ConnectionRefused => "server refuses a connection",
            Self::FlowControl => "flow control error",
            Self::StreamLimit => "too many streams opened",
            Self::StreamState => "frame received in invalid stream state",
            Self::FinalSize => "change to final size",
            Self::FrameEncoding => "frame encoding error",
            Self::TransportParameter => "error in transport parameters",
            Self::ConnectionIdLimit => "too many connection IDs received",
            Self::ProtocolViolation => "generic protocol violation",
            Self::InvalidToken => "invalid token received",
            Self::Application => "application error",
            Self::CryptoBufferExceeded => "crypto buffer exceeded",
            Self::Crypto(_) => "TLS alert",
        };
        f.write_str(description)
    }
}

/// The error code is not a known transport error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid error code {0}")]
pub struct InvalidErrorKind(pub VarInt);

impl TryFrom<VarInt> for ErrorKind {
    type Error = InvalidErrorKind;

    fn try_from(value: VarInt) -> Result<Self, Self::Error> {
        Ok(match value.into_inner() {
            0x00 => Self::None,
            0x01 => Self::Internal,
            0x02 => Self::ConnectionRefused,
            0x03 => Self::FlowControl,
            0x04 => Self::StreamLimit,
            0x05 => Self::StreamState,
            0x06 => Self::FinalSize,
            0x07 => Self::FrameEncoding,
            0x08 => Self::TransportParameter,
            0x09 => Self::ConnectionIdLimit,
            0x0a => Self::ProtocolViolation,
            0x0b => Self::InvalidToken,
            0x0c => Self::Application,
            0x0d => Self::CryptoBufferExceeded,
            code @ 0x0100..=0x01ff => Self::Crypto((code & 0xff) as u8),
            _ => return Err(InvalidErrorKind(value)),
        })
    }
}

impl From<ErrorKind> for VarInt {
    fn from(value: ErrorKind) -> Self {
        VarInt(match value {
            ErrorKind::None => 0x00,
            ErrorKind::Internal => 0x01,
            ErrorKind::ConnectionRefused => 0x02,
            ErrorKind::FlowControl => 0x03,
            ErrorKind::StreamLimit => 0x04,
            ErrorKind::StreamState => 0x05,
            ErrorKind::FinalSize => 0x06,
            ErrorKind::FrameEncoding => 0x07,
            ErrorKind::TransportParameter => 0x08,
            ErrorKind::ConnectionIdLimit => 0x09,
            ErrorKind::ProtocolViolation => 0x0a,
            ErrorKind::InvalidToken => 0x0b,
            ErrorKind::Application => 0x0c,
            ErrorKind::CryptoBufferExceeded => 0x0d,
            ErrorKind::Crypto(x) => 0x0100 + x as u64,
        })
    }
}

/// A transport error that terminates a connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} in {frame_type:?}: {reason}")]
pub struct QuicError {
    kind: ErrorKind,
    frame_type: FrameType,
    reason: Cow<'static, str>,
}

impl QuicError {
    pub fn new<T: Into<Cow<'static, str>>>(
        kind: ErrorKind,
        frame_type: FrameType,
        reason: T,
    ) -> Self {
        Self {
            kind,
            frame_type,
            reason: reason.into(),
        }
    }

    /// An error not caused by any particular frame, reported as PADDING.
    pub fn with_default_fty<T: Into<Cow<'static, str>>>(kind: ErrorKind, reason: T) -> Self {
        Self::new(kind, FrameType::Padding, reason)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn frame_type(&self) -> FrameType {
        self.frame_type
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<QuicError> for ConnectionCloseFrame {
    fn from(e: QuicError) -> Self {
        Self::new(e.kind, Some(e.frame_type), e.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        for code in [0x00u32, 0x07, 0x0a, 0x0d, 0x0128] {
            let kind = ErrorKind::try_from(VarInt::from(code)).unwrap();
            assert_eq!(VarInt::from(kind), VarInt::from(code));
        }
        assert_eq!(
            ErrorKind::try_from(VarInt::from(0x42u32)),
            Err(InvalidErrorKind(VarInt::from(0x42u32)))
        );
    }

    #[test]
    fn test_error_into_close_frame() {
        let error = QuicError::new(ErrorKind::ProtocolViolation, FrameType::Stream(0), "oops");
        let frame = ConnectionCloseFrame::from(error);
        assert_eq!(frame.error_kind, ErrorKind::ProtocolViolation);
        assert_eq!(frame.frame_type, Some(FrameType::Stream(0)));
        assert_eq!(frame.reason, "oops");
    }
}
