//! The connection side of QUIC packets: assembling the outgoing packets of a
//! connection, and the state the packet handler map routes incoming packets
//! to.
pub mod packer;
pub mod sealer;
pub mod source;
pub mod state;

pub use packer::{PackedPacket, Packer, PackerConfig, PackerConfigBuilder, PackerSources};
pub use state::{ArcConnState, ConnState};
