// CONNECTION_CLOSE Frame {
//   Type (i) = 0x1c..0x1d,
//   Error Code (i),
//   [Frame Type (i)],
//   Reason Phrase Length (i),
//   Reason Phrase (..),
// }

use std::borrow::Cow;

use nom::{Parser, bytes::streaming::take};

use super::{BeFrame, FrameType};
use crate::{
    error::ErrorKind,
    varint::{VarInt, WriteVarInt, be_varint},
};

/// Closes the connection, either for a transport error (with the type of the
/// frame that caused it) or for an application error (without).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub error_kind: ErrorKind,
    pub frame_type: Option<FrameType>,
    pub reason: Cow<'static, str>,
}

const CONNECTION_CLOSE_FRAME_TYPE: u8 = 0x1c;

const QUIC_LAYER: u8 = 0;
const APP_LAYER: u8 = 1;

impl BeFrame for ConnectionCloseFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::ConnectionClose(self.layer())
    }

    fn encoding_size(&self) -> usize {
        1 + VarInt::from(self.error_kind).encoding_size()
            + self.frame_type.map_or(0, |_| 1)
            + VarInt(self.reason.len() as u64).encoding_size()
            + self.reason.len()
    }
}

impl ConnectionCloseFrame {
    pub fn new(
        error_kind: ErrorKind,
        frame_type: Option<FrameType>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            error_kind,
            frame_type,
            reason: reason.into(),
        }
    }

    fn layer(&self) -> u8 {
        if self.frame_type.is_some() {
            QUIC_LAYER
        } else {
            APP_LAYER
        }
    }
}

/// Parse a CONNECTION_CLOSE frame of the given layer.
///
/// A frame type this implementation does not model is reported as PADDING,
/// the frame still closes the connection.
pub fn connection_close_frame_at_layer(
    layer: u8,
) -> impl Fn(&[u8]) -> nom::IResult<&[u8], ConnectionCloseFrame> {
    move |input: &[u8]| {
        let (remain, error_code) = be_varint(input)?;
        let error_kind = ErrorKind::try_from(error_code).map_err(|_| {
            nom::Err::Error(nom::error::make_error(input, nom::error::ErrorKind::Alt))
        })?;
        let (remain, frame_type) = if layer == QUIC_LAYER {
            let (remain, frame_type) = be_varint(remain)?;
            let frame_type = u8::try_from(frame_type.into_inner())
                .ok()
                .and_then(|ty| FrameType::try_from(ty).ok())
                .unwrap_or(FrameType::Padding);
            (remain, Some(frame_type))
        } else {
            (remain, None)
        };
        let (remain, reason_length) = be_varint(remain)?;
        let (remain, reason) =
            take::<_, _, nom::error::Error<&[u8]>>(reason_length.into_inner() as usize)
                .parse(remain)?;
        let reason = String::from_utf8_lossy(reason).into_owned();
        Ok((
            remain,
            ConnectionCloseFrame {
                error_kind,
                frame_type,
                reason: Cow::Owned(reason),
            },
        ))
    }
}

impl<T: bytes::BufMut> super::io::WriteFrame<ConnectionCloseFrame> for T {
    fn put_frame(&mut self, frame: &ConnectionCloseFrame) {
        self.put_u8(CONNECTION_CLOSE_FRAME_TYPE | frame.layer());
        self.put_varint(&frame.error_kind.into());
        if let Some(frame_type) = frame.frame_type {
            self.put_u8(frame_type.into());
        }
        self.put_varint(&VarInt(frame.reason.len() as u64));
        self.put_slice(frame.reason.as_bytes());
    }
}
