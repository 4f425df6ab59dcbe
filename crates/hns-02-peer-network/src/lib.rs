//! # HNS-02 Peer Network
//!
//! The P2P protocol engine of the SPV client.
//!
//! ## Purpose
//!
//! Talk to Handshake full nodes over plain TCP:
//! - the framed wire format and every message payload the client speaks
//! - the session state machine with its version/verack handshake
//! - request/response correlation with per-request deadlines
//! - the peer directory: seeding, error accounting, exclusion, and
//!   name-biased selection
//!
//! ## Module Structure
//!
//! ```text
//! hns-02-peer-network/
//! ├── domain/      # PeerRecord, NetError
//! ├── wire/        # frame, netaddress, message codecs
//! ├── session/     # PeerSession state machine
//! ├── directory/   # PeerDirectory
//! ├── adapters/    # peers-file persistence
//! ├── ports/       # seed-source traits (DNS seeds, DHT)
//! └── config.rs    # NetConfig
//! ```

#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod directory;
pub mod domain;
pub mod ports;
pub mod session;
pub mod wire;

// Re-exports
pub use config::NetConfig;
pub use directory::PeerDirectory;
pub use domain::{NetError, PeerRecord};
pub use ports::{DnsSeeds, SeedSource, StaticSeeds};
pub use session::{PeerSession, SessionState};
pub use wire::{Message, NetAddress, VersionPayload};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
