//! Network parameters.
//!
//! Everything a subsystem needs to know about the network it speaks to:
//! the wire magic, the default P2P port, protocol constants, and the
//! checkpoint witnesses that gate bootstrap.

use crate::entities::Hash;

/// Serialized size of a block header on the wire.
pub const HEADER_SIZE: usize = 236;

/// Number of headers carried by the embedded checkpoint blob.
pub const CHECKPOINT_HEADERS: usize = 150;

/// Total size of the checkpoint blob:
/// `height(4) || chainwork(32) || 150 * header(236)`.
pub const CHECKPOINT_BLOB_SIZE: usize = 4 + 32 + CHECKPOINT_HEADERS * HEADER_SIZE;

/// Upper bound on a single framed P2P message payload (8 MiB).
pub const MAX_MESSAGE_SIZE: u32 = 8 * 1024 * 1024;

/// Maximum number of headers a single `headers` message may carry.
pub const MAX_HEADERS_PER_MESSAGE: usize = 2000;

/// Parameters of the network a node instance talks to.
#[derive(Clone, Debug)]
pub struct NetworkParams {
    /// Wire magic; frames with a different magic drop the connection.
    pub magic: u32,
    /// Default P2P port.
    pub port: u16,
    /// Protocol version advertised in our `version` message.
    pub protocol_version: u32,
    /// User agent advertised in our `version` message.
    pub agent: &'static str,
    /// Services bitfield advertised in our `version` message. We advertise
    /// none; we are a client, not a full node.
    pub services: u64,
    /// Height the embedded checkpoint blob must declare.
    pub checkpoint_height: u32,
    /// Expected `nonce` of the first checkpoint header, a sanity witness
    /// against wrong-network or corrupted blobs.
    pub checkpoint_first_nonce: u32,
    /// Expected `nonce` of the last checkpoint header.
    pub checkpoint_last_nonce: u32,
    /// `prev_block` of the checkpoint's first header (the hash of the block
    /// immediately before the checkpoint window). The only context in which
    /// an all-zero `prev_block` is acceptable.
    pub checkpoint_prev_hash: Hash,
    /// Embedded bootstrap peers, tried after persisted peers and DNS seeds.
    pub bootstrap_peers: &'static [&'static str],
}

impl NetworkParams {
    /// Handshake mainnet.
    pub fn mainnet() -> Self {
        Self {
            magic: 0x5b6e_f2e2,
            port: 12038,
            protocol_version: 3,
            agent: "/hns-light:0.1.0/",
            services: 0,
            checkpoint_height: 136_000,
            checkpoint_first_nonce: 0x7c81_0f12,
            checkpoint_last_nonce: 0x03a4_61de,
            checkpoint_prev_hash: [0u8; 32],
            bootstrap_peers: &[
                "165.22.151.242:12038",
                "139.59.211.187:12038",
                "173.255.209.126:12038",
                "66.42.108.201:12038",
            ],
        }
    }

    /// Parameters for tests: a distinct magic so a stray mainnet frame
    /// fails loudly, loopback-friendly everything else.
    pub fn for_testing() -> Self {
        Self {
            magic: 0x7465_7374,
            port: 0,
            protocol_version: 3,
            agent: "/hns-light-test:0.1.0/",
            services: 0,
            checkpoint_height: 1000,
            checkpoint_first_nonce: 1,
            checkpoint_last_nonce: 150,
            checkpoint_prev_hash: [0u8; 32],
            bootstrap_peers: &[],
        }
    }
}
