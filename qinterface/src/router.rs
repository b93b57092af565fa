use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap, HashSet},
    io,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use bytes::Bytes;
use derive_builder::Builder;
use getset::CopyGetters;
use qbase::{
    cid::{ConnectionId, MAX_CID_SIZE},
    packet::{self, InvariantHeader},
    role::Role,
    token::{RESET_TOKEN_SIZE, ResetToken},
};
use thiserror::Error;
use tokio::{sync::Notify, task::JoinHandle, time::Instant};

use crate::{
    QuicInterface,
    conn::{PacketHandler, UnknownPacketHandler},
    packet::ReceivedPacket,
};

/// A stateless reset is never shorter: the first byte, the unpredictable
/// bytes padding it to look like a short header packet, and the token.
pub const MIN_STATELESS_RESET_SIZE: usize = 1 + 22 + RESET_TOKEN_SIZE;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("error parsing invariant header: {0}")]
    InvariantHeader(packet::Error),
    #[error("error parsing header: {0}")]
    Header(packet::Error),
    #[error("received a packet with an unexpected connection ID {0}")]
    UnknownConnectionId(ConnectionId),
    #[error("received a short header packet with an unexpected connection ID {0}")]
    UnknownShortConnectionId(ConnectionId),
    #[error("received a stateless reset")]
    StatelessReset,
    #[error("packet length ({actual} bytes) is smaller than the expected length ({expected} bytes)")]
    PacketTooShort { actual: u64, expected: u64 },
    #[error("packet length ({length} bytes) shorter than packet number ({pn_size} bytes)")]
    LengthShorterThanPacketNumber { length: u64, pn_size: u64 },
    #[error("connection ID {0} is already registered")]
    DuplicateConnectionId(ConnectionId),
    #[error("packet handler map is closed")]
    Closed,
    #[error("error reading from the interface: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::Io(Arc::new(error))
    }
}

#[derive(Builder, CopyGetters, Debug, Clone, Copy, PartialEq, Eq)]
#[builder(default, build_fn(skip))]
pub struct Config {
    /// The length of the connection IDs of this endpoint, short headers do
    /// not carry it.
    #[getset(get_copy = "pub")]
    short_cid_len: usize,
    /// How long a retired connection ID is still routed.
    #[getset(get_copy = "pub")]
    retire_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            short_cid_len: 8,
            retire_delay: Duration::from_secs(5),
        }
    }
}

impl ConfigBuilder {
    /// Connection IDs longer than [`MAX_CID_SIZE`] do not exist, a longer
    /// `short_cid_len` is cut to it.
    pub fn build(&self) -> Config {
        let default = Config::default();
        Config {
            short_cid_len: self
                .short_cid_len
                .unwrap_or(default.short_cid_len)
                .min(MAX_CID_SIZE),
            retire_delay: self.retire_delay.unwrap_or(default.retire_delay),
        }
    }
}

struct Entry {
    handler: Arc<dyn PacketHandler>,
    reset_token: Option<ResetToken>,
    retire_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.retire_at.is_some_and(|at| at <= now)
    }
}

#[derive(Default)]
struct Inner {
    handlers: HashMap<ConnectionId, Entry>,
    reset_tokens: HashMap<ResetToken, ConnectionId>,
    server: Option<Arc<dyn UnknownPacketHandler>>,
    retired: BinaryHeap<Reverse<(Instant, ConnectionId)>>,
    closed: bool,
}

impl Inner {
    /// A retired entry past its delay is gone, even if not purged yet.
    fn lookup(&self, cid: &ConnectionId, now: Instant) -> Option<Arc<dyn PacketHandler>> {
        self.handlers
            .get(cid)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.handler.clone())
    }

    fn lookup_reset_token(&self, datagram: &[u8], now: Instant) -> Option<Arc<dyn PacketHandler>> {
        if datagram.len() < MIN_STATELESS_RESET_SIZE {
            return None;
        }
        let token = ResetToken::from_datagram_tail(datagram)?;
        let cid = self.reset_tokens.get(&token)?;
        self.lookup(cid, now)
    }

    fn remove(&mut self, cid: &ConnectionId) -> Option<Entry> {
        let entry = self.handlers.remove(cid)?;
        if let Some(token) = entry.reset_token {
            if self.reset_tokens.get(&token) == Some(cid) {
                self.reset_tokens.remove(&token);
            }
        }
        Some(entry)
    }

    /// Every registered handler once, however many connection IDs it owns.
    fn distinct_handlers(&self) -> Vec<Arc<dyn PacketHandler>> {
        let mut seen = HashSet::new();
        self.handlers
            .values()
            .map(|entry| entry.handler.clone())
            .filter(|handler| seen.insert(Arc::as_ptr(handler).cast::<()>()))
            .collect()
    }
}

enum Receiver {
    Session(Arc<dyn PacketHandler>),
    Server(Arc<dyn UnknownPacketHandler>),
}

enum Route {
    Found(Receiver),
    StatelessReset(Arc<dyn PacketHandler>),
}

/// Routes the datagrams read from one socket to the connections sharing it,
/// by destination connection ID.
///
/// There is a single lock, guarding the whole table. It is never held while
/// calling into a handler, so handlers are free to register, retire or remove
/// connection IDs from within their callbacks.
pub struct PacketHandlerMap {
    config: Config,
    inner: Mutex<Inner>,
    sweep: Arc<Notify>,
}

impl PacketHandlerMap {
    /// Create the map and spawn the task purging retired connection IDs,
    /// which ends once the map is closed or dropped.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: Config) -> Arc<Self> {
        let sweep = Arc::new(Notify::new());
        let map = Arc::new(Self {
            config,
            inner: Mutex::default(),
            sweep: sweep.clone(),
        });
        tokio::spawn(Self::sweep_retired(Arc::downgrade(&map), sweep));
        map
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `handler` as the only receiver of the packets sent to `cid`.
    ///
    /// A connection ID that is already owned is not taken over, the owner
    /// is kept and [`Error::DuplicateConnectionId`] returned.
    pub fn add(&self, cid: ConnectionId, handler: Arc<dyn PacketHandler>) -> Result<(), Error> {
        self.insert(cid, handler, None)
    }

    /// As [`add`](Self::add), and recognize the datagrams ending with `token`
    /// as stateless resets of the connection.
    pub fn add_with_reset_token(
        &self,
        cid: ConnectionId,
        handler: Arc<dyn PacketHandler>,
        token: ResetToken,
    ) -> Result<(), Error> {
        self.insert(cid, handler, Some(token))
    }

    fn insert(
        &self,
        cid: ConnectionId,
        handler: Arc<dyn PacketHandler>,
        reset_token: Option<ResetToken>,
    ) -> Result<(), Error> {
        let now = Instant::now();
        let mut inner = self.lock();
        if inner.closed {
            tracing::warn!(%cid, "rejected registration on a closed packet handler map");
            return Err(Error::Closed);
        }
        match inner.handlers.get(&cid).map(|entry| entry.is_expired(now)) {
            Some(false) => {
                tracing::warn!(%cid, "rejected registration of an owned connection ID");
                return Err(Error::DuplicateConnectionId(cid));
            }
            // retired and past its delay, just not purged yet
            Some(true) => _ = inner.remove(&cid),
            None => {}
        }
        if let Some(token) = reset_token {
            inner.reset_tokens.insert(token, cid);
        }
        inner.handlers.insert(
            cid,
            Entry {
                handler,
                reset_token,
                retire_at: None,
            },
        );
        tracing::debug!(%cid, "connection ID registered");
        Ok(())
    }

    /// Forget `cid` at once, the packets sent to it from now on are
    /// unexpected.
    pub fn remove(&self, cid: &ConnectionId) {
        if self.lock().remove(cid).is_some() {
            tracing::debug!(%cid, "connection ID removed");
        }
    }

    /// Forget `cid` once the retire delay has elapsed. Until then, packets
    /// sent to it are still routed, late packets of a closed connection
    /// reach it rather than look unexpected.
    pub fn retire(&self, cid: &ConnectionId) {
        let retire_at = Instant::now() + self.config.retire_delay;
        let mut inner = self.lock();
        let Some(entry) = inner.handlers.get_mut(cid) else {
            return;
        };
        if entry.retire_at.is_some() {
            return;
        }
        entry.retire_at = Some(retire_at);
        inner.retired.push(Reverse((retire_at, *cid)));
        drop(inner);

        tracing::debug!(%cid, delay = ?self.config.retire_delay, "connection ID retired");
        self.sweep.notify_one();
    }

    /// Install the receiver of the long header packets no connection is
    /// registered for.
    pub fn set_server(&self, server: Arc<dyn UnknownPacketHandler>) {
        self.lock().server = Some(server);
    }

    /// Uninstall the server, and close every connection it accepted.
    /// Connections of the client role are left alone.
    pub fn close_server(&self) {
        let handlers = {
            let mut inner = self.lock();
            inner.server = None;
            inner.distinct_handlers()
        };
        tracing::debug!("server closed");
        for handler in handlers {
            if handler.role() == Role::Server {
                handler.close();
            }
        }
    }

    /// Destroy every registered connection with `error`, once each, and
    /// refuse any registration afterwards. Calling it again does nothing.
    pub fn close(&self, error: Error) {
        let handlers = {
            let mut inner = self.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.server = None;
            inner.retired.clear();
            inner.reset_tokens.clear();
            let handlers = inner.distinct_handlers();
            inner.handlers.clear();
            handlers
        };
        self.sweep.notify_one();
        for handler in handlers {
            handler.destroy(error.clone());
        }
    }

    /// Route one datagram.
    ///
    /// An error means the datagram was dropped, and nothing else: the
    /// caller logs it and carries on with the next datagram.
    pub fn handle_packet(&self, remote: SocketAddr, datagram: Bytes) -> Result<(), Error> {
        let rcvd_time = Instant::now();
        let invariant = InvariantHeader::parse(&datagram, self.config.short_cid_len)
            .map_err(Error::InvariantHeader)?;

        let receiver = match self.route(&invariant, &datagram, rcvd_time)? {
            Route::Found(receiver) => receiver,
            Route::StatelessReset(handler) => {
                tracing::warn!(dcid = %invariant.dcid(), %remote, "received a stateless reset");
                handler.destroy(Error::StatelessReset);
                return Ok(());
            }
        };

        let packet = ReceivedPacket::parse(remote, invariant, &datagram, rcvd_time)?;
        match receiver {
            Receiver::Session(handler) => handler.handle_packet(packet),
            Receiver::Server(server) => server.handle_packet(packet),
        }
        Ok(())
    }

    fn route(
        &self,
        invariant: &InvariantHeader,
        datagram: &[u8],
        now: Instant,
    ) -> Result<Route, Error> {
        let inner = self.lock();
        if inner.closed {
            return Err(Error::Closed);
        }
        let dcid = invariant.dcid();
        if let Some(handler) = inner.lookup(dcid, now) {
            return Ok(Route::Found(Receiver::Session(handler)));
        }
        if !invariant.is_long_header() {
            return inner
                .lookup_reset_token(datagram, now)
                .map(Route::StatelessReset)
                .ok_or(Error::UnknownShortConnectionId(*dcid));
        }
        inner
            .server
            .clone()
            .map(|server| Route::Found(Receiver::Server(server)))
            .ok_or(Error::UnknownConnectionId(*dcid))
    }

    /// Spawn the receive loop reading `iface`, it ends when reading fails,
    /// closing the map with the error.
    pub fn listen(self: &Arc<Self>, iface: Arc<dyn QuicInterface>) -> JoinHandle<()> {
        let map = self.clone();
        tokio::spawn(async move {
            tracing::debug!(local = ?iface.local_addr().ok(), "start receiving datagrams");
            loop {
                let (datagram, remote) = match core::future::poll_fn(|cx| iface.poll_recv(cx)).await
                {
                    Ok(received) => received,
                    Err(error) => {
                        tracing::error!(%error, "failed to receive datagram");
                        map.close(error.into());
                        return;
                    }
                };
                if let Err(error) = map.handle_packet(remote, datagram.freeze()) {
                    tracing::debug!(%error, %remote, "dropped datagram");
                }
            }
        })
    }

    /// Purge the retired connection IDs past their delay, and return when
    /// the next one is due. `None` once the map is closed.
    fn purge_retired(&self, now: Instant) -> Option<Option<Instant>> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        while let Some(&Reverse((retire_at, cid))) = inner.retired.peek() {
            if retire_at > now {
                return Some(Some(retire_at));
            }
            inner.retired.pop();
            // removed, or removed and registered again, since retired
            let still_retired = inner
                .handlers
                .get(&cid)
                .is_some_and(|entry| entry.retire_at == Some(retire_at));
            if still_retired {
                inner.remove(&cid);
                tracing::debug!(%cid, "retired connection ID purged");
            }
        }
        Some(None)
    }

    async fn sweep_retired(map: Weak<Self>, sweep: Arc<Notify>) {
        loop {
            let notified = sweep.notified();
            let next = match map.upgrade() {
                Some(map) => match map.purge_retired(Instant::now()) {
                    Some(next) => next,
                    None => return,
                },
                None => return,
            };
            match next {
                Some(deadline) => tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = notified => {}
                },
                None => notified.await,
            }
        }
    }
}

impl Drop for PacketHandlerMap {
    fn drop(&mut self) {
        // let the sweep task find out it is gone
        self.sweep.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        task::{Context, Poll},
    };

    use bytes::{BufMut, BytesMut};
    use qbase::{
        packet::{LongHeaderBuilder, PacketNumber, PacketNumberLen, WriteHeader},
        version::Version,
    };
    use tokio::sync::mpsc;

    use super::*;

    #[derive(Default)]
    struct MockSession {
        role: Option<Role>,
        packets: Mutex<Vec<ReceivedPacket>>,
        destroyed: Mutex<Vec<String>>,
        closed: AtomicUsize,
    }

    impl MockSession {
        fn new(role: Role) -> Arc<Self> {
            Arc::new(Self {
                role: Some(role),
                ..Default::default()
            })
        }

        fn dcids(&self) -> Vec<ConnectionId> {
            let packets = self.packets.lock().unwrap();
            packets.iter().map(|p| *qbase::packet::GetDcid::dcid(&p.header)).collect()
        }

        fn destroyed(&self) -> Vec<String> {
            self.destroyed.lock().unwrap().clone()
        }
    }

    impl PacketHandler for MockSession {
        fn handle_packet(&self, packet: ReceivedPacket) {
            self.packets.lock().unwrap().push(packet);
        }

        fn destroy(&self, error: Error) {
            self.destroyed.lock().unwrap().push(error.to_string());
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }

        fn version(&self) -> Version {
            Version::DRAFT_16
        }

        fn role(&self) -> Role {
            self.role.unwrap_or(Role::Client)
        }
    }

    #[derive(Default)]
    struct MockServer {
        packets: Mutex<Vec<ReceivedPacket>>,
    }

    impl UnknownPacketHandler for MockServer {
        fn handle_packet(&self, packet: ReceivedPacket) {
            self.packets.lock().unwrap().push(packet);
        }
    }

    fn remote() -> SocketAddr {
        "127.0.0.1:4433".parse().unwrap()
    }

    fn new_map(retire_delay: Duration) -> Arc<PacketHandlerMap> {
        PacketHandlerMap::new(
            ConfigBuilder::default()
                .short_cid_len(5usize)
                .retire_delay(retire_delay)
                .build(),
        )
    }

    fn handshake_packet(dcid: &[u8]) -> Bytes {
        let header = LongHeaderBuilder::with_cid(
            Version::DRAFT_16,
            ConnectionId::from_slice(dcid),
            ConnectionId::EMPTY,
        )
        .handshake(PacketNumber::new(0, PacketNumberLen::One));
        let mut buf = BytesMut::new();
        buf.put_header(&header, 0);
        buf.freeze()
    }

    fn stateless_reset(dcid: &[u8], token: &ResetToken) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(0x40);
        buf.put_slice(dcid);
        buf.put_bytes(0, 50);
        buf.put_slice(token);
        buf.freeze()
    }

    const CID1: [u8; 8] = [1, 2, 3, 4, 5, 6, 7, 8];
    const CID2: [u8; 8] = [8, 7, 6, 5, 4, 3, 2, 1];

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::default().build();
        assert_eq!(config, Config::default());
        assert_eq!(config.short_cid_len(), 8);
        assert_eq!(config.retire_delay(), Duration::from_secs(5));

        let config = ConfigBuilder::default().short_cid_len(64usize).build();
        assert_eq!(config.short_cid_len(), MAX_CID_SIZE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_by_connection_id() {
        let map = new_map(Duration::from_secs(5));
        let session1 = MockSession::new(Role::Client);
        let session2 = MockSession::new(Role::Client);
        map.add(ConnectionId::from_slice(&CID1), session1.clone()).unwrap();
        map.add(ConnectionId::from_slice(&CID2), session2.clone()).unwrap();

        map.handle_packet(remote(), handshake_packet(&CID1)).unwrap();
        map.handle_packet(remote(), handshake_packet(&CID2)).unwrap();
        assert_eq!(session1.dcids(), [ConnectionId::from_slice(&CID1)]);
        assert_eq!(session2.dcids(), [ConnectionId::from_slice(&CID2)]);

        let err = map
            .handle_packet(remote(), handshake_packet(&[0x11, 0x22, 0x33, 0x44]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a packet with an unexpected connection ID 0x11223344"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_unparseable_packets() {
        let map = new_map(Duration::from_secs(5));
        let err = map
            .handle_packet(remote(), Bytes::from_static(&[0, 1, 2, 3]))
            .unwrap_err();
        assert!(err.to_string().starts_with("error parsing invariant header:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reject_duplicate_connection_id() {
        let map = new_map(Duration::from_secs(5));
        let owner = MockSession::new(Role::Client);
        let cid = ConnectionId::from_slice(&CID1);
        map.add(cid, owner.clone()).unwrap();
        assert!(matches!(
            map.add(cid, MockSession::new(Role::Client)),
            Err(Error::DuplicateConnectionId(c)) if c == cid
        ));

        map.handle_packet(remote(), handshake_packet(&CID1)).unwrap();
        assert_eq!(owner.dcids().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_immediately() {
        let map = new_map(Duration::from_secs(3600));
        let cid = ConnectionId::from_slice(&CID1);
        map.add(cid, MockSession::new(Role::Client)).unwrap();
        map.remove(&cid);
        let err = map.handle_packet(remote(), handshake_packet(&CID1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a packet with an unexpected connection ID 0x0102030405060708"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retire_after_delay() {
        let map = new_map(Duration::from_millis(10));
        let session = MockSession::new(Role::Client);
        let cid = ConnectionId::from_slice(&CID1);
        map.add(cid, session.clone()).unwrap();
        map.retire(&cid);

        tokio::time::sleep(Duration::from_millis(5)).await;
        map.handle_packet(remote(), handshake_packet(&CID1)).unwrap();
        assert_eq!(session.dcids().len(), 1);

        tokio::time::sleep(Duration::from_millis(25)).await;
        let err = map.handle_packet(remote(), handshake_packet(&CID1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a packet with an unexpected connection ID 0x0102030405060708"
        );
        assert!(map.lock().handlers.is_empty());
        assert_eq!(session.dcids().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stateless_reset() {
        let map = new_map(Duration::from_secs(5));
        let session = MockSession::new(Role::Client);
        let cid = [0xde, 0xca, 0xfb, 0xad];
        let token = ResetToken::new([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        map.add_with_reset_token(ConnectionId::from_slice(&cid), session.clone(), token)
            .unwrap();

        map.handle_packet(remote(), handshake_packet(&cid)).unwrap();
        assert_eq!(session.dcids().len(), 1);
        assert!(session.destroyed().is_empty());

        map.handle_packet(remote(), stateless_reset(&[0; 5], &token))
            .unwrap();
        assert_eq!(session.destroyed(), ["received a stateless reset"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retire_drops_reset_token() {
        let map = new_map(Duration::from_millis(10));
        let cid = [0xde, 0xad, 0xbe, 0xef, 0x42];
        let token = ResetToken::new([1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16]);
        map.add_with_reset_token(ConnectionId::from_slice(&cid), MockSession::new(Role::Client), token)
            .unwrap();
        map.retire(&ConnectionId::from_slice(&cid));

        tokio::time::sleep(Duration::from_millis(30)).await;
        let err = map.handle_packet(remote(), handshake_packet(&cid)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a packet with an unexpected connection ID 0xdeadbeef42"
        );
        let err = map
            .handle_packet(remote(), stateless_reset(&[0xde, 0xca, 0xfb, 0xad, 0x99], &token))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a short header packet with an unexpected connection ID 0xdecafbad99"
        );
        assert!(map.lock().reset_tokens.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_fallback() {
        let map = new_map(Duration::from_secs(5));
        let server = Arc::new(MockServer::default());
        map.set_server(server.clone());

        let cid = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        map.handle_packet(remote(), handshake_packet(&cid)).unwrap();
        assert_eq!(server.packets.lock().unwrap().len(), 1);

        map.close_server();
        let err = map.handle_packet(remote(), handshake_packet(&cid)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "received a packet with an unexpected connection ID 0x1122334455667788"
        );
        assert_eq!(server.packets.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_server_sessions() {
        let map = new_map(Duration::from_secs(5));
        let client = MockSession::new(Role::Client);
        let server = MockSession::new(Role::Server);
        map.add(ConnectionId::from_slice(&[1, 1, 1, 1]), client.clone()).unwrap();
        map.add(ConnectionId::from_slice(&[2, 2, 2, 2]), server.clone()).unwrap();
        map.add(ConnectionId::from_slice(&[3, 3, 3, 3]), server.clone()).unwrap();

        map.close_server();
        assert_eq!(client.closed.load(Ordering::SeqCst), 0);
        assert_eq!(server.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_destroys_once() {
        let map = new_map(Duration::from_secs(5));
        let session1 = MockSession::new(Role::Client);
        let session2 = MockSession::new(Role::Server);
        map.add(ConnectionId::from_slice(&[1, 1, 1, 1]), session1.clone()).unwrap();
        map.add(ConnectionId::from_slice(&[2, 2, 2, 2]), session2.clone()).unwrap();
        map.add(ConnectionId::from_slice(&[3, 3, 3, 3]), session2.clone()).unwrap();

        map.close(Error::Closed);
        map.close(Error::StatelessReset);
        assert_eq!(session1.destroyed(), ["packet handler map is closed"]);
        assert_eq!(session2.destroyed(), ["packet handler map is closed"]);

        assert!(matches!(
            map.add(ConnectionId::from_slice(&CID1), MockSession::new(Role::Client)),
            Err(Error::Closed)
        ));
    }

    struct MockInterface {
        rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    }

    impl QuicInterface for MockInterface {
        fn local_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:443".parse().unwrap())
        }

        fn poll_recv(&self, cx: &mut Context) -> Poll<io::Result<(BytesMut, SocketAddr)>> {
            let mut rx = self.rx.lock().unwrap();
            rx.poll_recv(cx).map(|datagram| match datagram {
                Some(datagram) => Ok((BytesMut::from(&datagram[..]), remote())),
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket closed")),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_loop() {
        let map = new_map(Duration::from_secs(5));
        let session1 = MockSession::new(Role::Client);
        let session2 = MockSession::new(Role::Client);
        map.add(ConnectionId::from_slice(&CID1), session1.clone()).unwrap();
        map.add(ConnectionId::from_slice(&CID2), session2.clone()).unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = map.listen(Arc::new(MockInterface { rx: Mutex::new(rx) }));
        tx.send(handshake_packet(&CID1)).unwrap();
        tx.send(Bytes::from_static(&[0x80])).unwrap();
        tx.send(handshake_packet(&CID2)).unwrap();
        tx.send(handshake_packet(&CID1)).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(session1.dcids().len(), 2);
        assert_eq!(session2.dcids().len(), 1);
        let destroyed = session1.destroyed();
        assert_eq!(destroyed.len(), 1);
        assert!(destroyed[0].contains("socket closed"));
        assert_eq!(session2.destroyed().len(), 1);
    }
}
