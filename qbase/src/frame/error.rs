use thiserror::Error;

use super::FrameType;
use crate::{
    error::{ErrorKind, QuicError},
    varint::VarInt,
};

/// Parse errors when decoding QUIC frames.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum Error {
    #[error("Incomplete frame type")]
    IncompleteType,
    #[error("Invalid frame type from {0}")]
    InvalidType(VarInt),
    #[error("Incomplete frame {0:?}: {1}")]
    IncompleteFrame(FrameType, String),
    #[error("Error occurred when parsing frame {0:?}: {1}")]
    ParseError(FrameType, String),
}

impl From<Error> for QuicError {
    fn from(e: Error) -> Self {
        tracing::error!("   Cause by: parse frame error {e}");
        match &e {
            Error::IncompleteType | Error::InvalidType(_) => {
                Self::with_default_fty(ErrorKind::FrameEncoding, e.to_string())
            }
            Error::IncompleteFrame(fty, _) | Error::ParseError(fty, _) => {
                Self::new(ErrorKind::FrameEncoding, *fty, e.to_string())
            }
        }
    }
}
