use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use qbase::packet::EncryptionLevel;
use rustls::quic::PacketKey;

/// Protects the payload of an outgoing packet.
pub trait Sealer: Send + Sync {
    /// Encrypt everything in `packet` after the first `header_len` bytes in
    /// place, the header being the associated data, and append the
    /// authentication tag.
    ///
    /// Exactly [`overhead`](Sealer::overhead) bytes are appended.
    fn seal(&self, pn: u64, packet: &mut BytesMut, header_len: usize)
    -> Result<(), rustls::Error>;

    fn overhead(&self) -> usize;
}

impl Sealer for Box<dyn PacketKey> {
    fn seal(&self, pn: u64, packet: &mut BytesMut, header_len: usize) -> Result<(), rustls::Error> {
        let (header, payload) = packet.split_at_mut(header_len);
        let tag = self.encrypt_in_place(pn, header, payload)?;
        packet.put_slice(tag.as_ref());
        Ok(())
    }

    fn overhead(&self) -> usize {
        self.tag_len()
    }
}

/// The keys a connection currently has for sending.
pub trait SealingManager: Send + Sync {
    /// The highest encryption level keys are installed for, and its sealer.
    ///
    /// `None` before the handshake installed any keys.
    fn get_sealer(&self) -> Option<(EncryptionLevel, Arc<dyn Sealer>)>;

    /// The sealer of a specific level, `None` if its keys are not installed
    /// or already discarded.
    fn get_sealer_with_level(&self, level: EncryptionLevel) -> Option<Arc<dyn Sealer>>;
}
