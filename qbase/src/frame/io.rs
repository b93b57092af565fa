use bytes::{BufMut, Bytes};
use nom::{Parser, combinator::map};

use super::{
    ack::ack_frame_with_flag, connection_close::connection_close_frame_at_layer,
    crypto::be_crypto_frame, max_data::be_max_data_frame,
    max_stream_data::be_max_stream_data_frame, reset_stream::be_reset_stream_frame,
    stop_sending::be_stop_sending_frame, stream::stream_frame_with_flag, *,
};

/// Parse the body of a frame whose type is already consumed.
///
/// The data of `STREAM` and `CRYPTO` frames is sliced out of `raw`, which
/// `input` must be the tail of.
fn complete_frame<'a>(
    frame_type: FrameType,
    raw: &Bytes,
    input: &'a [u8],
) -> nom::IResult<&'a [u8], Frame> {
    match frame_type {
        FrameType::Padding => Ok((input, Frame::Padding(PaddingFrame))),
        FrameType::Ping => Ok((input, Frame::Ping(PingFrame))),
        FrameType::Ack(ecn) => map(ack_frame_with_flag(ecn), Frame::Ack).parse(input),
        FrameType::ConnectionClose(layer) => {
            map(connection_close_frame_at_layer(layer), Frame::Close).parse(input)
        }
        FrameType::MaxData => map(be_max_data_frame, Frame::MaxData).parse(input),
        FrameType::ResetStream => {
            map(be_reset_stream_frame, |f| Frame::StreamCtl(f.into())).parse(input)
        }
        FrameType::StopSending => {
            map(be_stop_sending_frame, |f| Frame::StreamCtl(f.into())).parse(input)
        }
        FrameType::MaxStreamData => {
            map(be_max_stream_data_frame, |f| Frame::StreamCtl(f.into())).parse(input)
        }
        FrameType::Crypto => {
            let (input, frame) = be_crypto_frame(input)?;
            let data = take_data(raw, input, frame.len())?;
            Ok((&input[frame.len()..], Frame::Crypto(frame, data)))
        }
        FrameType::Stream(flag) => {
            let (input, frame) = stream_frame_with_flag(flag)(input)?;
            let data = take_data(raw, input, frame.length)?;
            Ok((&input[frame.length..], Frame::Stream(frame, data)))
        }
    }
}

fn take_data<'a>(
    raw: &Bytes,
    input: &'a [u8],
    len: usize,
) -> Result<Bytes, nom::Err<nom::error::Error<&'a [u8]>>> {
    if input.len() < len {
        return Err(nom::Err::Incomplete(nom::Needed::new(len - input.len())));
    }
    let start = raw.len() - input.len();
    Ok(raw.slice(start..start + len))
}

/// Parse one frame from the head of `raw`, returning the bytes it took.
pub fn be_frame(raw: &Bytes) -> Result<(usize, Frame), Error> {
    let input = raw.as_ref();
    let (remain, frame_type) = be_frame_type(input).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => Error::IncompleteType,
    })?;

    let (remain, frame) = complete_frame(frame_type, raw, remain).map_err(|e| match e {
        ne @ nom::Err::Incomplete(_) => Error::IncompleteFrame(frame_type, ne.to_string()),
        // TooLarge in CRYPTO/STREAM, Verify in ACK, Alt in CONNECTION_CLOSE
        nom::Err::Error(ne) | nom::Err::Failure(ne) => {
            Error::ParseError(frame_type, ne.code.description().to_owned())
        }
    })?;
    Ok((input.len() - remain.len(), frame))
}

/// A [`bytes::BufMut`] extension trait, write a frame in wire format.
///
/// For `STREAM` and `CRYPTO` frames this writes only the frame header, see
/// [`WriteDataFrame`].
pub trait WriteFrame<F> {
    fn put_frame(&mut self, frame: &F);
}

/// A [`bytes::BufMut`] extension trait, write a data frame and its data.
pub trait WriteDataFrame<F, D: ?Sized> {
    fn put_data_frame(&mut self, frame: &F, data: &D);
}

impl<T: BufMut, D: AsRef<[u8]> + ?Sized> WriteDataFrame<StreamFrame, D> for T {
    fn put_data_frame(&mut self, frame: &StreamFrame, data: &D) {
        let data = data.as_ref();
        assert_eq!(frame.length, data.len());
        self.put_frame(frame);
        self.put_slice(data);
    }
}

impl<T: BufMut, D: AsRef<[u8]> + ?Sized> WriteDataFrame<CryptoFrame, D> for T {
    fn put_data_frame(&mut self, frame: &CryptoFrame, data: &D) {
        let data = data.as_ref();
        assert_eq!(frame.len(), data.len());
        self.put_frame(frame);
        self.put_slice(data);
    }
}

impl<T: BufMut> WriteFrame<StreamCtlFrame> for T {
    fn put_frame(&mut self, frame: &StreamCtlFrame) {
        match frame {
            StreamCtlFrame::ResetStream(frame) => self.put_frame(frame),
            StreamCtlFrame::StopSending(frame) => self.put_frame(frame),
            StreamCtlFrame::MaxStreamData(frame) => self.put_frame(frame),
        }
    }
}

impl<T: BufMut> WriteFrame<Frame> for T {
    fn put_frame(&mut self, frame: &Frame) {
        match frame {
            Frame::Padding(frame) => self.put_frame(frame),
            Frame::Ping(frame) => self.put_frame(frame),
            Frame::Ack(frame) => self.put_frame(frame),
            Frame::Close(frame) => self.put_frame(frame),
            Frame::MaxData(frame) => self.put_frame(frame),
            Frame::StreamCtl(frame) => self.put_frame(frame),
            Frame::Stream(frame, data) => self.put_data_frame(frame, data),
            Frame::Crypto(frame, data) => self.put_data_frame(frame, data),
        }
    }
}
