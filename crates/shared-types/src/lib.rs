//! # Shared Types
//!
//! Primitives used by every HNS-Light subsystem: hash aliases, network
//! parameters, and the variable-length integer encoding shared by the P2P
//! wire format and the proof record serialization.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding;
pub mod entities;
pub mod network;

pub use encoding::{read_varint, write_varint, VarintError};
pub use entities::{short_hash, BlockHash, Hash, NameHash};
pub use network::NetworkParams;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
