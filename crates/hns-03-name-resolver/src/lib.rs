//! # HNS-03 Name Resolver
//!
//! The name-query scheduler and recursive resolution pipeline.
//!
//! ## Purpose
//!
//! Turn DNS questions into verified Handshake records:
//! - proof envelopes (CBOR or length-prefixed binary, either accepted)
//! - name-tree proof verification by ordered double-SHA256 folding
//! - parallel `getproof` fan-out, first verified response wins
//! - TLD-in-blockchain vs. subdomain-via-glue recursive resolution
//! - a TTL-bounded DNS response cache
//!
//! ## Module Structure
//!
//! ```text
//! hns-03-name-resolver/
//! ├── domain/      # Resource records, errors
//! ├── proof/       # envelope codec, root folding
//! ├── query/       # parallel name query
//! ├── dns/         # wire codec, response cache
//! ├── resolver/    # recursive pipeline
//! ├── ports/       # ProofNetwork, TipSource traits + mocks
//! └── config.rs    # ResolverConfig
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod dns;
pub mod domain;
pub mod ports;
pub mod proof;
pub mod query;
pub mod resolver;

// Re-exports
pub use config::ResolverConfig;
pub use domain::{name_hash, Resource, ResolveError};
pub use ports::{MockProofNetwork, MockReply, PeerOutcome, ProofNetwork, TipSnapshot, TipSource};
pub use proof::{verify_proof, ProofEnvelope};
pub use query::{query_name, QueryResult};
pub use resolver::{RecursiveResolver, Resolution};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
