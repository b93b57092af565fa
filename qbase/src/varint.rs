use std::{cmp::Ordering, fmt};

use bytes::BufMut;
use nom::{IResult, Parser, bits::streaming::take, combinator::flat_map, error::Error};

/// An integer less than 2^62, encodable as a QUIC variable-length integer.
///
/// The two most significant bits of the first encoded byte carry the base-2
/// logarithm of the encoding length, so a value takes 1, 2, 4 or 8 bytes.
#[derive(Default, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarInt(pub(crate) u64);

/// The maximum value that can be represented by a QUIC variable-length integer.
pub const VARINT_MAX: u64 = 0x3fff_ffff_ffff_ffff;

/// The number of bytes a [`VarInt`] is forced to be encoded in.
///
/// Only a few fields need a fixed width, e.g. the `Length` field of a long
/// header, which is reserved before the payload size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeBytes {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl VarInt {
    pub const MAX: Self = Self(VARINT_MAX);
    pub const MAX_SIZE: usize = 8;

    pub const fn from_u32(x: u32) -> Self {
        Self(x as u64)
    }

    /// Succeeds if `x` < 2^62.
    pub fn from_u64(x: u64) -> Result<Self, err::Overflow> {
        if x <= VARINT_MAX {
            Ok(Self(x))
        } else {
            Err(err::Overflow(x))
        }
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }

    /// The number of bytes the shortest encoding of this value takes.
    pub fn encoding_size(self) -> usize {
        match self.0 {
            x if x < (1 << 6) => 1,
            x if x < (1 << 14) => 2,
            x if x < (1 << 30) => 4,
            _ => 8,
        }
    }
}

impl From<VarInt> for u64 {
    fn from(x: VarInt) -> Self {
        x.0
    }
}

impl From<u8> for VarInt {
    fn from(x: u8) -> Self {
        Self(x.into())
    }
}

impl From<u16> for VarInt {
    fn from(x: u16) -> Self {
        Self(x.into())
    }
}

impl From<u32> for VarInt {
    fn from(x: u32) -> Self {
        Self(x.into())
    }
}

impl TryFrom<u64> for VarInt {
    type Error = err::Overflow;

    fn try_from(x: u64) -> Result<Self, Self::Error> {
        Self::from_u64(x)
    }
}

impl TryFrom<usize> for VarInt {
    type Error = err::Overflow;

    fn try_from(x: usize) -> Result<Self, Self::Error> {
        Self::from_u64(x as u64)
    }
}

impl PartialEq<u64> for VarInt {
    fn eq(&self, other: &u64) -> bool {
        self.0.eq(other)
    }
}

impl PartialOrd<u64> for VarInt {
    fn partial_cmp(&self, other: &u64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

impl fmt::Display for VarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

pub mod err {
    use thiserror::Error;

    /// The value exceeds 2^62 - 1 and can not be encoded as a variable-length integer.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
    #[error("value({0}) too large for varint encoding")]
    pub struct Overflow(pub(super) u64);
}

/// Parse a variable-length integer, [nom](https://docs.rs/nom/latest/nom/) parser style.
///
/// Returns [`nom::Err::Incomplete`] when the input ends inside the integer.
///
/// ```
/// use qbase::varint::{be_varint, VarInt};
///
/// let input = &[0b01000000, 0x01][..];
/// assert_eq!(be_varint(input), Ok((&[][..], VarInt::from_u32(1))));
/// ```
pub fn be_varint(input: &[u8]) -> IResult<&[u8], VarInt> {
    flat_map(take(2usize), |prefix: u8| {
        take::<&[u8], u64, usize, Error<(&[u8], usize)>>((8 << prefix) - 2)
    })
    .parse((input, 0))
    .map_err(|err| match err {
        nom::Err::Incomplete(needed) => {
            nom::Err::Incomplete(needed.map(|n| n.get().div_ceil(8) - input.len()))
        }
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            nom::Err::Error(nom::error::make_error(e.input.0, e.code))
        }
    })
    .map(|((remain, _), value)| (remain, VarInt(value)))
}

/// A [`bytes::BufMut`] extension trait for writing variable-length integers.
pub trait WriteVarInt: BufMut {
    /// Write the shortest encoding of `value`.
    fn put_varint(&mut self, value: &VarInt);

    /// Write `value` in exactly `nbytes` bytes.
    ///
    /// Panics if `value` does not fit in `nbytes`.
    fn encode_varint(&mut self, value: &VarInt, nbytes: EncodeBytes);
}

impl<T: BufMut> WriteVarInt for T {
    fn put_varint(&mut self, value: &VarInt) {
        let nbytes = match value.encoding_size() {
            1 => EncodeBytes::One,
            2 => EncodeBytes::Two,
            4 => EncodeBytes::Four,
            _ => EncodeBytes::Eight,
        };
        self.encode_varint(value, nbytes);
    }

    fn encode_varint(&mut self, value: &VarInt, nbytes: EncodeBytes) {
        let x = value.0;
        match nbytes {
            EncodeBytes::One => {
                assert!(x < 1 << 6);
                self.put_u8(x as u8);
            }
            EncodeBytes::Two => {
                assert!(x < 1 << 14);
                self.put_u16((0b01 << 14) | x as u16);
            }
            EncodeBytes::Four => {
                assert!(x < 1 << 30);
                self.put_u32((0b10 << 30) | x as u32);
            }
            EncodeBytes::Eight => {
                assert!(x <= VARINT_MAX);
                self.put_u64((0b11 << 62) | x);
            }
        }
    }
}
