//! Filesystem adapters.

pub mod store;

pub use store::{HeaderStore, StoredChain};
