use std::fmt;

use bytes::BufMut;
use nom::{IResult, Parser, bytes::streaming::take, combinator::map};
use rand::Rng;

/// The maximum length of a connection ID.
pub const MAX_CID_SIZE: usize = 20;

/// A connection ID, copied and compared by value.
///
/// It is the only key used to route an inbound datagram to its connection.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct ConnectionId {
    len: u8,
    bytes: [u8; MAX_CID_SIZE],
}

impl ConnectionId {
    /// The zero-length connection ID.
    pub const EMPTY: Self = Self {
        len: 0,
        bytes: [0; MAX_CID_SIZE],
    };

    /// Panics if `bytes` is longer than [`MAX_CID_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Self {
        assert!(bytes.len() <= MAX_CID_SIZE);
        let mut res = Self {
            len: bytes.len() as u8,
            bytes: [0; MAX_CID_SIZE],
        };
        res.bytes[..bytes.len()].copy_from_slice(bytes);
        res
    }

    /// Generate a random connection ID of the given length.
    /// The cid maybe not unique, so it should be checked before use.
    pub fn random_gen(len: usize) -> Self {
        assert!(len <= MAX_CID_SIZE);
        let mut bytes = [0; MAX_CID_SIZE];
        rand::rng().fill(&mut bytes[..len]);
        Self {
            len: len as u8,
            bytes,
        }
    }

    /// Whether this connection ID can be carried by a long header,
    /// see [`encode_cid_len`].
    pub fn fits_long_header(&self) -> bool {
        encode_cid_len(self.len()).is_some()
    }
}

impl std::ops::Deref for ConnectionId {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes[..self.len as usize]
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Hex with a `0x` prefix, `(empty)` for the zero-length connection ID.
impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("(empty)");
        }
        f.write_str("0x")?;
        self.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

/// Decode one nibble of the long header connection ID length byte.
///
/// Nibble 0 means an empty connection ID, any other nibble `n` means `n + 3`
/// bytes. Lengths 1 to 3 have no encoding.
pub fn decode_cid_len(nibble: u8) -> usize {
    match nibble & 0x0f {
        0 => 0,
        n => n as usize + 3,
    }
}

/// Inverse of [`decode_cid_len`], `None` for lengths without an encoding.
pub fn encode_cid_len(len: usize) -> Option<u8> {
    match len {
        0 => Some(0),
        4..=18 => Some((len - 3) as u8),
        _ => None,
    }
}

/// Parse a connection ID of a known length.
pub fn be_connection_id_with_len(
    len: usize,
) -> impl Fn(&[u8]) -> IResult<&[u8], ConnectionId> {
    move |input| map(take(len), ConnectionId::from_slice).parse(input)
}

/// A [`bytes::BufMut`] extension trait for writing the bytes of a connection ID.
///
/// The length is never written here, it is either implied (short header)
/// or nibble encoded in a separate byte (long header).
pub trait WriteConnectionId: BufMut {
    fn put_connection_id(&mut self, cid: &ConnectionId);
}

impl<T: BufMut> WriteConnectionId for T {
    fn put_connection_id(&mut self, cid: &ConnectionId) {
        self.put_slice(cid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cid_len_nibble() {
        assert_eq!(decode_cid_len(0), 0);
        assert_eq!(decode_cid_len(1), 4);
        assert_eq!(decode_cid_len(0xf), 18);
        assert_eq!(encode_cid_len(0), Some(0));
        assert_eq!(encode_cid_len(8), Some(5));
        assert_eq!(encode_cid_len(18), Some(15));
        for unrepresentable in [1, 2, 3, 19, 20] {
            assert_eq!(encode_cid_len(unrepresentable), None);
        }
        for nibble in 1..=0xf {
            assert_eq!(encode_cid_len(decode_cid_len(nibble)), Some(nibble));
        }
    }

    #[test]
    fn test_read_connection_id() {
        let buf = [0x01, 0x02, 0x03, 0x04, 0x05];
        let (remain, cid) = be_connection_id_with_len(4)(&buf[..]).unwrap();
        assert_eq!(remain, &[0x05]);
        assert_eq!(*cid, [0x01, 0x02, 0x03, 0x04]);

        assert!(matches!(
            be_connection_id_with_len(8)(&buf[..]),
            Err(nom::Err::Incomplete(_))
        ));
    }

    #[test]
    fn test_display_connection_id() {
        let cid = ConnectionId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(cid.to_string(), "0x0102030405060708");
        assert_eq!(ConnectionId::default().to_string(), "(empty)");
    }

    #[test]
    #[should_panic]
    fn test_cid_from_large_slice() {
        ConnectionId::from_slice(&[0; MAX_CID_SIZE + 1]);
    }
}
