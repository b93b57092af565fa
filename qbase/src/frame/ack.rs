// ACK Frame {
//   Type (i) = 0x02..0x03,
//   Largest Acknowledged (i),
//   ACK Delay (i),
//   ACK Range Count (i),
//   First ACK Range (i),
//   ACK Range (..) ...,
//   [ECN Counts (..)],
// }

use std::{ops::RangeInclusive, vec::IntoIter};

use nom::{Parser, combinator::map};

use super::{BeFrame, FrameType};
use crate::varint::{VarInt, WriteVarInt, be_varint, err::Overflow};

/// Acknowledges received packets, never retransmitted itself.
///
/// A newer ACK frame always supersedes a lost one, so the loss of a packet
/// carrying only ACK frames is never repaired by resending it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AckFrame {
    pub largest: VarInt,
    pub delay: VarInt,
    pub first_range: VarInt,
    pub ranges: Vec<(VarInt, VarInt)>,
    pub ecn: Option<EcnCounts>,
}

const ACK_FRAME_TYPE: u8 = 0x02;

const ECN_OPT: u8 = 0x1;

impl BeFrame for AckFrame {
    fn frame_type(&self) -> FrameType {
        FrameType::Ack(if self.ecn.is_some() { ECN_OPT } else { 0 })
    }

    fn encoding_size(&self) -> usize {
        1 + self.largest.encoding_size()
            + self.delay.encoding_size()
            + VarInt(self.ranges.len() as u64).encoding_size()
            + self.first_range.encoding_size()
            + self
                .ranges
                .iter()
                .map(|(gap, ack)| gap.encoding_size() + ack.encoding_size())
                .sum::<usize>()
            + self.ecn.as_ref().map_or(0, EcnCounts::encoding_size)
    }
}

impl AckFrame {
    pub fn new(
        largest: u64,
        first_range: u32,
        delay: u64,
        ecn: Option<EcnCounts>,
    ) -> Result<Self, Overflow> {
        Ok(Self {
            largest: VarInt::try_from(largest)?,
            delay: VarInt::try_from(delay)?,
            first_range: VarInt::from_u32(first_range),
            ranges: Vec::new(),
            ecn,
        })
    }

    /// Safe: The number of gaps and ACK ranges to be acknowledged at a time cannot exceed 2^32.
    pub fn alternating_gap_and_range(&mut self, gap: u32, range: u32) {
        self.ranges
            .push((VarInt::from_u32(gap), VarInt::from_u32(range)));
    }

    pub fn take_ecn(&mut self) -> Option<EcnCounts> {
        self.ecn.take()
    }

    /// Whether every range stays above packet number 0.
    fn is_well_formed(&self) -> bool {
        let Some(mut smallest) = self
            .largest
            .into_inner()
            .checked_sub(self.first_range.into_inner())
        else {
            return false;
        };
        self.ranges.iter().all(|(gap, ack)| {
            match smallest
                .checked_sub(gap.into_inner() + 2)
                .and_then(|largest| largest.checked_sub(ack.into_inner()))
            {
                Some(next) => {
                    smallest = next;
                    true
                }
                None => false,
            }
        })
    }
}

impl IntoIterator for AckFrame {
    type Item = RangeInclusive<u64>;
    type IntoIter = IntoAckIter;

    /// Note: Calling `into_iter` will consume the ownership of the `AckFrame`.
    /// Before doing so, it is important to handle the ECN information in the `AckFrame`.
    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter {
            largest: self.largest.into_inner(),
            first_range: Some(self.first_range.into_inner()),
            iter: self.ranges.into_iter(),
        }
    }
}

/// Yields the acknowledged ranges from the largest down.
#[derive(Debug)]
pub struct IntoAckIter {
    largest: u64,
    first_range: Option<u64>,
    iter: IntoIter<(VarInt, VarInt)>,
}

impl Iterator for IntoAckIter {
    type Item = RangeInclusive<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(first_range) = self.first_range.take() {
            let largest = self.largest;
            let smallest = largest - first_range;
            self.largest = smallest;
            Some(smallest..=largest)
        } else {
            self.iter.next().map(|(gap, range)| {
                let largest = self.largest - gap.into_inner() - 2;
                let smallest = largest - range.into_inner();
                self.largest = smallest;
                smallest..=largest
            })
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EcnCounts {
    pub ect0: VarInt,
    pub ect1: VarInt,
    pub ce: VarInt,
}

impl EcnCounts {
    fn encoding_size(&self) -> usize {
        self.ect0.encoding_size() + self.ect1.encoding_size() + self.ce.encoding_size()
    }
}

/// Parse an ACK frame whose type carried the given ECN bit.
///
/// Ranges reaching below packet number 0 fail with [`nom::error::ErrorKind::Verify`].
pub fn ack_frame_with_flag(ecn_flag: u8) -> impl Fn(&[u8]) -> nom::IResult<&[u8], AckFrame> {
    move |input: &[u8]| {
        let (mut remain, (largest, delay, count, first_range)) =
            (be_varint, be_varint, be_varint, be_varint).parse(input)?;
        // every range takes at least 2 bytes, do not trust the count for the capacity
        let mut ranges = Vec::with_capacity((count.into_inner() as usize).min(remain.len() / 2));
        for _ in 0..count.into_inner() {
            let (r, (gap, ack)) = (be_varint, be_varint).parse(remain)?;
            ranges.push((gap, ack));
            remain = r;
        }

        let ecn = if ecn_flag & ECN_OPT != 0 {
            let (r, ecn) = be_ecn_counts(remain)?;
            remain = r;
            Some(ecn)
        } else {
            None
        };

        let frame = AckFrame {
            largest,
            delay,
            first_range,
            ranges,
            ecn,
        };
        if !frame.is_well_formed() {
            return Err(nom::Err::Error(nom::error::make_error(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }
        Ok((remain, frame))
    }
}

fn be_ecn_counts(input: &[u8]) -> nom::IResult<&[u8], EcnCounts> {
    map((be_varint, be_varint, be_varint), |(ect0, ect1, ce)| {
        EcnCounts { ect0, ect1, ce }
    })
    .parse(input)
}

impl<T: bytes::BufMut> super::io::WriteFrame<AckFrame> for T {
    fn put_frame(&mut self, frame: &AckFrame) {
        let mut frame_type = ACK_FRAME_TYPE;
        if frame.ecn.is_some() {
            frame_type |= ECN_OPT;
        }
        self.put_u8(frame_type);
        self.put_varint(&frame.largest);
        self.put_varint(&frame.delay);
        self.put_varint(&VarInt(frame.ranges.len() as u64));
        self.put_varint(&frame.first_range);
        for (gap, ack) in &frame.ranges {
            self.put_varint(gap);
            self.put_varint(ack);
        }
        if let Some(ecn) = &frame.ecn {
            self.put_varint(&ecn.ect0);
            self.put_varint(&ecn.ect1);
            self.put_varint(&ecn.ce);
        }
    }
}
