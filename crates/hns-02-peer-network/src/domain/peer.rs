//! Per-peer bookkeeping.

use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// What the directory remembers about a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerRecord {
    /// The peer's address.
    pub addr: SocketAddr,
    /// Unix seconds of the last successful interaction.
    pub last_seen: u64,
    /// Proofs this peer has served that verified.
    pub proofs_ok: u32,
    /// Consecutive failures since the last success.
    pub errors: u32,
    /// Came from the embedded bootstrap list.
    pub is_bootstrap: bool,
    /// Unix seconds when the error threshold was crossed, for cooldown.
    pub excluded_at: Option<u64>,
}

/// Unix seconds now.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl PeerRecord {
    /// A fresh record for a newly discovered peer.
    pub fn new(addr: SocketAddr, is_bootstrap: bool) -> Self {
        Self {
            addr,
            last_seen: 0,
            proofs_ok: 0,
            errors: 0,
            is_bootstrap,
            excluded_at: None,
        }
    }

    /// A successful query resets the error count.
    pub fn record_success(&mut self, now: u64) {
        self.last_seen = now;
        self.proofs_ok = self.proofs_ok.saturating_add(1);
        self.errors = 0;
        self.excluded_at = None;
    }

    /// Count a failure with the given weight; marks the exclusion time
    /// when the threshold is crossed.
    pub fn record_error(&mut self, weight: u32, max_errors: u32, now: u64) {
        self.errors = self.errors.saturating_add(weight);
        if self.errors >= max_errors && self.excluded_at.is_none() {
            self.excluded_at = Some(now);
        }
    }

    /// Whether this peer is currently excluded. The exclusion lapses
    /// after the cooldown, with the error count halved so a still-bad
    /// peer re-excludes quickly.
    pub fn is_excluded(&mut self, max_errors: u32, cooldown_secs: u64, now: u64) -> bool {
        if self.errors < max_errors {
            return false;
        }
        match self.excluded_at {
            Some(since) if now.saturating_sub(since) >= cooldown_secs => {
                self.errors = max_errors / 2;
                self.excluded_at = None;
                false
            }
            _ => true,
        }
    }
}
