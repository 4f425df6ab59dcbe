//! Port traits for external peer sources.

pub mod outbound;

pub use outbound::{DnsSeeds, SeedSource, StaticSeeds};
