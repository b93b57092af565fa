use std::sync::{Arc, Mutex, PoisonError};

use qbase::{role::Role, version::Version};
use qinterface::{conn::PacketHandler, packet::ReceivedPacket, router::Error};
use tokio::sync::mpsc;

/// Where a connection is in its life, as far as incoming packets go.
///
/// The state only moves forward: Active, then Draining, then Closed.
#[derive(Debug)]
pub enum ConnState {
    /// Packets are delivered to the connection's receive task.
    Active(mpsc::UnboundedSender<ReceivedPacket>),
    /// Closed gracefully, packets are dropped until the connection is gone.
    Draining,
    Closed(Error),
}

/// A connection registered in the packet handler map.
#[derive(Debug)]
pub struct ArcConnState {
    role: Role,
    version: Version,
    state: Mutex<ConnState>,
}

impl ArcConnState {
    /// A connection in the active state, and the receiving end of the
    /// packets routed to it.
    pub fn new(
        role: Role,
        version: Version,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ReceivedPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            role,
            version,
            state: Mutex::new(ConnState::Active(tx)),
        });
        (conn, rx)
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.lock(), ConnState::Active(_))
    }

    pub fn is_draining(&self) -> bool {
        matches!(*self.lock(), ConnState::Draining)
    }

    /// Why the connection was destroyed, `None` if it was not.
    pub fn error(&self) -> Option<Error> {
        match &*self.lock() {
            ConnState::Closed(error) => Some(error.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ConnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PacketHandler for ArcConnState {
    fn handle_packet(&self, packet: ReceivedPacket) {
        match &*self.lock() {
            ConnState::Active(tx) => {
                if tx.send(packet).is_err() {
                    tracing::debug!(role = %self.role, "receive task gone, packet dropped");
                }
            }
            _ => tracing::trace!(role = %self.role, "connection not active, packet dropped"),
        }
    }

    fn destroy(&self, error: Error) {
        let mut state = self.lock();
        if matches!(*state, ConnState::Closed(_)) {
            return;
        }
        tracing::debug!(role = %self.role, %error, "connection destroyed");
        *state = ConnState::Closed(error);
    }

    fn close(&self) {
        let mut state = self.lock();
        if let ConnState::Active(_) = *state {
            tracing::debug!(role = %self.role, "connection draining");
            *state = ConnState::Draining;
        }
    }

    fn version(&self) -> Version {
        self.version
    }

    fn role(&self) -> Role {
        self.role
    }
}
