//! # HNS-01 Header Chain
//!
//! The header-chain engine of the SPV client.
//!
//! ## Purpose
//!
//! Follow the Handshake header chain from a trusted embedded checkpoint
//! without holding full blocks:
//! - 236-byte header codec and the Blake2b/SHA3 chained proof-of-work hash
//! - checkpoint bootstrap with witness validation
//! - in-memory chain window with link, overshoot, and target checks
//! - on-disk persistence with integrity checksums and atomic replace
//! - the `getheaders` sync loop driven through an outbound port
//!
//! ## Module Structure
//!
//! ```text
//! hns-01-header-chain/
//! ├── domain/       # Header, HeaderChain, Checkpoint, errors
//! ├── algorithms/   # Header sync loop
//! ├── ports/        # HeaderSource trait + mock
//! ├── adapters/     # File-backed HeaderStore
//! └── config.rs     # ChainConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports
pub use adapters::{HeaderStore, StoredChain};
pub use algorithms::{sync_once, SyncOutcome};
pub use config::ChainConfig;
pub use domain::{compact_to_target, ChainError, Checkpoint, Header, HeaderChain, TipInfo};
pub use ports::{HeaderSource, MockHeaderSource};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
