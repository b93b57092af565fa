use bytes::BufMut;
use nom::{
    IResult, Parser,
    combinator::map,
    number::streaming::{be_u8, be_u16, be_u32},
};

/// The number of bytes a packet number is encoded in.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PacketNumberLen {
    One = 1,
    Two = 2,
    Four = 4,
}

impl PacketNumberLen {
    /// The shortest length for `pn` that the peer can still decode, given
    /// the largest packet number it acknowledged.
    ///
    /// The window must cover twice the distance between the two.
    pub fn for_range(pn: u64, largest_acked: Option<u64>) -> Self {
        let range = match largest_acked {
            Some(largest_acked) => pn.saturating_sub(largest_acked) * 2,
            None => pn.saturating_add(1) * 2,
        };
        if range < 1 << 7 {
            Self::One
        } else if range < 1 << 14 {
            Self::Two
        } else {
            Self::Four
        }
    }

    /// The bits of the packet number the encoding keeps.
    pub fn bits(self) -> u32 {
        match self {
            Self::One => 7,
            Self::Two => 14,
            Self::Four => 30,
        }
    }

    /// The 2-bit code of a short header, 3 is not a valid code.
    pub(crate) fn from_short_code(code: u8) -> Option<Self> {
        match code & 0x03 {
            0 => Some(Self::One),
            1 => Some(Self::Two),
            2 => Some(Self::Four),
            _ => None,
        }
    }

    pub(crate) fn short_code(self) -> u8 {
        match self {
            Self::One => 0,
            Self::Two => 1,
            Self::Four => 2,
        }
    }
}

/// A truncated packet number, as carried in a packet header.
///
/// The full packet number is an integer in the range 0 to 2^62 - 1, only its
/// least significant 7, 14 or 30 bits are sent.
///
/// Long headers encode it self-describing, the leading bits of the first byte
/// tell the length:
///
/// ```text
/// 0xxxxxxx                                     (7 bits)
/// 10xxxxxx xxxxxxxx                            (14 bits)
/// 11xxxxxx xxxxxxxx xxxxxxxx xxxxxxxx          (30 bits)
/// ```
///
/// Short headers carry the length in the low 2 bits of their first byte and
/// write the number as plain big endian bytes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PacketNumber {
    U8(u8),
    U16(u16),
    U32(u32),
}

impl PacketNumber {
    /// Truncate `pn` to the given length.
    pub fn new(pn: u64, len: PacketNumberLen) -> Self {
        let mask = (1u64 << len.bits()) - 1;
        let truncated = pn & mask;
        match len {
            PacketNumberLen::One => Self::U8(truncated as u8),
            PacketNumberLen::Two => Self::U16(truncated as u16),
            PacketNumberLen::Four => Self::U32(truncated as u32),
        }
    }

    pub fn len(self) -> PacketNumberLen {
        match self {
            Self::U8(_) => PacketNumberLen::One,
            Self::U16(_) => PacketNumberLen::Two,
            Self::U32(_) => PacketNumberLen::Four,
        }
    }

    /// Return the size of the packet number encoding.
    pub fn size(self) -> usize {
        self.len() as usize
    }

    pub fn value(self) -> u32 {
        match self {
            Self::U8(x) => x as u32,
            Self::U16(x) => x as u32,
            Self::U32(x) => x,
        }
    }

    /// Recover the full packet number, `expected` being the largest packet
    /// number received so far plus one.
    ///
    /// See [Appendix A.3](https://www.rfc-editor.org/rfc/rfc9000.html#section-a.3)
    /// for the algorithm.
    pub fn decode(self, expected: u64) -> u64 {
        let nbits = self.len().bits();
        let win = 1u64 << nbits;
        let hwin = win / 2;
        let mask = win - 1;
        let truncated = self.value() as u64 & mask;
        // The result must be within (expected - hwin, expected + hwin], simply
        // replacing the low bits of expected may land outside of it.
        let candidate = (expected & !mask) | truncated;
        if expected.checked_sub(hwin).is_some_and(|x| candidate <= x) {
            candidate + win
        } else if candidate > expected + hwin && candidate >= win {
            candidate - win
        } else {
            candidate
        }
    }
}

/// Parse a self-describing packet number of a long header,
/// [nom](https://docs.rs/nom/latest/nom/) parser style.
pub fn be_long_packet_number(input: &[u8]) -> IResult<&[u8], PacketNumber> {
    let (_, first) = be_u8::<_, nom::error::Error<&[u8]>>(input)?;
    match first >> 6 {
        0b00 | 0b01 => map(be_u8, |x| PacketNumber::U8(x & 0x7f)).parse(input),
        0b10 => map(be_u16, |x| PacketNumber::U16(x & 0x3fff)).parse(input),
        _ => map(be_u32, |x| PacketNumber::U32(x & 0x3fff_ffff)).parse(input),
    }
}

/// Parse a packet number of a short header, whose length is known from the
/// first byte.
pub fn take_pn_len(len: PacketNumberLen) -> impl Fn(&[u8]) -> IResult<&[u8], PacketNumber> {
    move |input: &[u8]| match len {
        PacketNumberLen::One => map(be_u8, PacketNumber::U8).parse(input),
        PacketNumberLen::Two => map(be_u16, PacketNumber::U16).parse(input),
        PacketNumberLen::Four => map(be_u32, PacketNumber::U32).parse(input),
    }
}

/// A [`bytes::BufMut`] extension trait for writing packet numbers.
pub trait WritePacketNumber: BufMut {
    /// Write the self-describing form of a long header.
    fn put_long_packet_number(&mut self, pn: PacketNumber);

    /// Write the plain form of a short header.
    fn put_packet_number(&mut self, pn: PacketNumber);
}

impl<T: BufMut> WritePacketNumber for T {
    fn put_long_packet_number(&mut self, pn: PacketNumber) {
        match pn {
            PacketNumber::U8(x) => self.put_u8(x & 0x7f),
            PacketNumber::U16(x) => self.put_u16(0x8000 | (x & 0x3fff)),
            PacketNumber::U32(x) => self.put_u32(0xc000_0000 | (x & 0x3fff_ffff)),
        }
    }

    fn put_packet_number(&mut self, pn: PacketNumber) {
        match pn {
            PacketNumber::U8(x) => self.put_u8(x),
            PacketNumber::U16(x) => self.put_u16(x),
            PacketNumber::U32(x) => self.put_u32(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_packet_number() {
        let cases: [(PacketNumber, &[u8]); 3] = [
            (PacketNumber::U8(0x55), &[0x55]),
            (PacketNumber::U16(0x1234), &[0x92, 0x34]),
            (PacketNumber::U32(0x0123_4567), &[0xc1, 0x23, 0x45, 0x67]),
        ];
        for (pn, bytes) in cases {
            let mut buf = vec![];
            buf.put_long_packet_number(pn);
            assert_eq!(buf, bytes);
            assert_eq!(be_long_packet_number(&buf), Ok((&[][..], pn)));
        }
        assert!(matches!(
            be_long_packet_number(&[0xc1, 0x23]),
            Err(nom::Err::Incomplete(_))
        ));
    }

    #[test]
    fn test_short_packet_number() {
        let buf = [0x01, 0x00, 0x00, 0x00];
        assert_eq!(
            take_pn_len(PacketNumberLen::Four)(&buf[..]),
            Ok((&[][..], PacketNumber::U32(1 << 24)))
        );
        assert_eq!(
            take_pn_len(PacketNumberLen::Two)(&buf[..]),
            Ok((&[0x00, 0x00][..], PacketNumber::U16(1 << 8)))
        );
        let mut out = vec![];
        out.put_packet_number(PacketNumber::U16(1 << 8));
        assert_eq!(out, [0x01, 0x00]);
    }

    #[test]
    fn test_short_code() {
        for len in [PacketNumberLen::One, PacketNumberLen::Two, PacketNumberLen::Four] {
            assert_eq!(PacketNumberLen::from_short_code(len.short_code()), Some(len));
        }
        assert_eq!(PacketNumberLen::from_short_code(3), None);
    }

    #[test]
    fn test_packet_number_len_for_range() {
        assert_eq!(PacketNumberLen::for_range(0, None), PacketNumberLen::One);
        assert_eq!(PacketNumberLen::for_range(100, Some(90)), PacketNumberLen::One);
        assert_eq!(PacketNumberLen::for_range(100, None), PacketNumberLen::Two);
        assert_eq!(PacketNumberLen::for_range(20000, Some(1)), PacketNumberLen::Four);
    }

    #[test]
    fn test_decode_packet_number() {
        // the example of RFC 9000 A.3, within a 30 bit window
        let pn = PacketNumber::new(0xa82f_9b32, PacketNumberLen::Four);
        assert_eq!(pn.decode(0xa82f_30ea + 1), 0xa82f_9b32);

        let pn = PacketNumber::new(300, PacketNumberLen::Two);
        assert_eq!(pn, PacketNumber::U16(300));
        assert_eq!(pn.decode(290), 300);

        // wrapped around the 7 bit window
        let pn = PacketNumber::new(130, PacketNumberLen::One);
        assert_eq!(pn, PacketNumber::U8(2));
        assert_eq!(pn.decode(127), 130);
        assert_eq!(PacketNumber::new(5, PacketNumberLen::One).decode(0), 5);
    }
}
