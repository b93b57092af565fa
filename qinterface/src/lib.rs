//! The socket facing side of QUIC: datagrams read from one socket are routed
//! by connection ID to the connections sharing it.
pub mod conn;
pub mod packet;
pub mod router;

use std::{
    io,
    net::SocketAddr,
    task::{Context, Poll},
};

use bytes::BytesMut;

/// A datagram socket the [`router::PacketHandlerMap`] reads from.
pub trait QuicInterface: Send + Sync {
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Receive one datagram and the address it came from.
    ///
    /// An error is final, the interface is never polled again afterwards.
    fn poll_recv(&self, cx: &mut Context) -> Poll<io::Result<(BytesMut, SocketAddr)>>;
}
