use qbase::{role::Role, version::Version};

use crate::{packet::ReceivedPacket, router::Error};

/// A connection, as seen by the [`PacketHandlerMap`](crate::router::PacketHandlerMap).
///
/// The map owns nothing of the connection's lifecycle but routing, and the
/// final [`destroy`](PacketHandler::destroy) when its socket fails. All the
/// methods are called without any lock of the map held, so they may call
/// back into the map.
pub trait PacketHandler: Send + Sync {
    fn handle_packet(&self, packet: ReceivedPacket);

    /// Tear the connection down immediately. Calling it on a connection that
    /// is already torn down does nothing.
    fn destroy(&self, error: Error);

    /// Close the connection gracefully, it drains before it is gone.
    fn close(&self);

    fn version(&self) -> Version;

    fn role(&self) -> Role;
}

/// Receives the long header packets no connection is registered for,
/// usually a server accepting new connections.
pub trait UnknownPacketHandler: Send + Sync {
    fn handle_packet(&self, packet: ReceivedPacket);
}
