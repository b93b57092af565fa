//! Wire-level building blocks of QUIC: integers, identifiers, frames and
//! packet headers, with their parsers and writers.
//!
//! Parsers are [nom](https://docs.rs/nom/latest/nom/) style functions named
//! `be_*`, writers are [`bytes::BufMut`] extension traits named `Write*`.

pub mod cid;
pub mod error;
pub mod frame;
pub mod packet;
pub mod param;
pub mod role;
pub mod sid;
pub mod token;
pub mod varint;
pub mod version;
