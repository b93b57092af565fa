use std::fmt;

use nom::{IResult, Parser, combinator::map};

use crate::{
    role::Role,
    varint::{VarInt, WriteVarInt, be_varint},
};

/// Stream directions, the second least significant bit of a [`StreamId`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Dir {
    /// Data flows in both directions
    Bi = 0,
    /// Data flows only from the stream's initiator
    Uni = 1,
}

/// A stream ID, a 62-bit integer encoded as [`VarInt`].
///
/// The lowest bit is the initiator's role and the next one the direction.
/// Allocating stream IDs is the business of the streams map, here it is only
/// carried inside STREAM and stream control frames.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StreamId(u64);

impl StreamId {
    pub fn role(&self) -> Role {
        if self.0 & 0x1 == 0 {
            Role::Client
        } else {
            Role::Server
        }
    }

    pub fn dir(&self) -> Dir {
        if self.0 & 0x2 == 0 { Dir::Bi } else { Dir::Uni }
    }

    pub fn encoding_size(&self) -> usize {
        VarInt(self.0).encoding_size()
    }
}

impl From<VarInt> for StreamId {
    fn from(v: VarInt) -> Self {
        Self(v.into_inner())
    }
}

impl From<StreamId> for VarInt {
    fn from(s: StreamId) -> Self {
        VarInt(s.0)
    }
}

impl From<u32> for StreamId {
    fn from(id: u32) -> Self {
        Self(id as u64)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn be_streamid(input: &[u8]) -> IResult<&[u8], StreamId> {
    map(be_varint, StreamId::from).parse(input)
}

pub trait WriteStreamId: bytes::BufMut {
    fn put_streamid(&mut self, stream_id: &StreamId);
}

impl<T: bytes::BufMut> WriteStreamId for T {
    fn put_streamid(&mut self, stream_id: &StreamId) {
        self.put_varint(&VarInt(stream_id.0));
    }
}
