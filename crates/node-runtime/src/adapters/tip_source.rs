//! Published tip snapshot.
//!
//! The sync task owns the header chain outright (single writer); readers
//! get a snapshot it publishes after every round. `tip()` never suspends.

use parking_lot::RwLock;

use hns_03_name_resolver::{TipSnapshot, TipSource};

/// Shared, cheaply readable tip.
pub struct SharedTip {
    inner: RwLock<TipSnapshot>,
}

impl SharedTip {
    /// Start from a bootstrap snapshot.
    pub fn new(initial: TipSnapshot) -> Self {
        Self {
            inner: RwLock::new(initial),
        }
    }

    /// Publish a new tip.
    pub fn publish(&self, snapshot: TipSnapshot) {
        *self.inner.write() = snapshot;
    }
}

impl TipSource for SharedTip {
    fn tip(&self) -> TipSnapshot {
        *self.inner.read()
    }
}
