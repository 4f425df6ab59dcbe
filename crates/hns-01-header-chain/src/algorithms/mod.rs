//! Header chain algorithms.

pub mod header_sync;

pub use header_sync::{sync_once, SyncOutcome};
