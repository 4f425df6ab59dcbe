//! Filesystem adapters.

pub mod persistence;

pub use persistence::{load_peers, save_peers};
