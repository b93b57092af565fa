use std::time::Duration;

use getset::{CopyGetters, Setters};

use crate::token::ResetToken;

/// The peer's transport parameters, as far as packet assembly is concerned.
///
/// Decoding them is the business of the handshake, which hands them over
/// once they are authenticated.
#[derive(CopyGetters, Setters, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParameters {
    /// The largest UDP payload the peer is willing to receive.
    #[getset(get_copy = "pub", set = "pub")]
    max_packet_size: u64,
    #[getset(get_copy = "pub", set = "pub")]
    idle_timeout: Duration,
    /// Only a server sends one, for the connection ID of its handshake.
    #[getset(get_copy = "pub", set = "pub")]
    stateless_reset_token: Option<ResetToken>,
}

impl Default for TransportParameters {
    fn default() -> Self {
        Self {
            // the maximum permitted UDP payload
            max_packet_size: 65527,
            idle_timeout: Duration::ZERO,
            stateless_reset_token: None,
        }
    }
}
