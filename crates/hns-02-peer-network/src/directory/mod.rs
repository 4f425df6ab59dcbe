//! Peer directory.
//!
//! Seeds from persisted peers, DNS seeds, the embedded bootstrap list,
//! and gossip. Tracks per-peer failure counts, excludes misbehaving
//! peers until a cooldown lapses, and hands out candidates ordered by a
//! name-keyed permutation: repeated queries for one name converge on a
//! stable small subset while different names spread load.

use std::collections::HashMap;
use std::hash::Hasher;
use std::net::SocketAddr;

use rand::Rng;
use siphasher::sip::SipHasher13;

use crate::config::NetConfig;
use crate::domain::peer::{unix_now, PeerRecord};
use crate::wire::NetAddress;
use shared_types::NameHash;

/// Error weight for a transport failure or timeout.
pub const ERROR_WEIGHT_LIGHT: u32 = 1;
/// Error weight for a garbage or non-verifying reply.
pub const ERROR_WEIGHT_HEAVY: u32 = 2;

/// The set of peers we know, with their track records.
pub struct PeerDirectory {
    peers: HashMap<SocketAddr, PeerRecord>,
    config: NetConfig,
}

impl PeerDirectory {
    /// An empty directory.
    pub fn new(config: NetConfig) -> Self {
        Self {
            peers: HashMap::new(),
            config,
        }
    }

    /// Seed in source order: persisted peers, DNS-seed results, then the
    /// embedded bootstrap list.
    pub fn seed(
        &mut self,
        persisted: Vec<SocketAddr>,
        dns_seeds: Vec<SocketAddr>,
        bootstrap: &[&str],
    ) {
        for addr in persisted {
            self.add_peer(addr, false);
        }
        for addr in dns_seeds {
            self.add_peer(addr, false);
        }
        for entry in bootstrap {
            if let Ok(addr) = entry.parse() {
                self.add_peer(addr, true);
            }
        }
        tracing::info!("[hns-02] directory seeded with {} peers", self.peers.len());
    }

    /// Add a peer if it is new.
    pub fn add_peer(&mut self, addr: SocketAddr, is_bootstrap: bool) {
        self.peers
            .entry(addr)
            .or_insert_with(|| PeerRecord::new(addr, is_bootstrap));
    }

    /// Fold gossiped `addr` payloads in.
    pub fn ingest_addrs(&mut self, addrs: Vec<NetAddress>) {
        for addr in addrs {
            self.add_peer(addr.addr, false);
        }
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether the directory knows no peers at all.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Look a peer up.
    pub fn get(&self, addr: &SocketAddr) -> Option<&PeerRecord> {
        self.peers.get(addr)
    }

    /// A verifying proof came back from `addr`.
    pub fn record_success(&mut self, addr: SocketAddr) {
        let now = unix_now();
        self.peers
            .entry(addr)
            .or_insert_with(|| PeerRecord::new(addr, false))
            .record_success(now);
    }

    /// A session or query against `addr` failed.
    pub fn record_error(&mut self, addr: SocketAddr, weight: u32) {
        let now = unix_now();
        let max = self.config.peer_max_errors;
        self.peers
            .entry(addr)
            .or_insert_with(|| PeerRecord::new(addr, false))
            .record_error(weight, max, now);
    }

    /// Candidates for a name query, best first: non-excluded peers in the
    /// name-keyed SipHash order with a little jitter.
    pub fn select_for_name(&mut self, name_hash: &NameHash, count: usize) -> Vec<SocketAddr> {
        let now = unix_now();
        let max = self.config.peer_max_errors;
        let cooldown = self.config.peer_cooldown_secs;

        let k0 = u64::from_le_bytes(name_hash[0..8].try_into().expect("8 bytes"));
        let k1 = u64::from_le_bytes(name_hash[8..16].try_into().expect("8 bytes"));

        let mut scored: Vec<(u64, SocketAddr)> = self
            .peers
            .values_mut()
            .filter_map(|p| {
                if p.is_excluded(max, cooldown, now) {
                    return None;
                }
                let mut hasher = SipHasher13::new_with_keys(k0, k1);
                hasher.write(p.addr.to_string().as_bytes());
                Some((hasher.finish(), p.addr))
            })
            .collect();
        scored.sort_unstable_by_key(|(score, _)| *score);

        // Jitter: occasionally swap neighbors so one slow peer cannot own
        // a name forever.
        let mut rng = rand::thread_rng();
        let mut i = 1;
        while i < scored.len() {
            if rng.gen_bool(0.1) {
                scored.swap(i - 1, i);
            }
            i += 1;
        }

        scored.into_iter().take(count).map(|(_, a)| a).collect()
    }

    /// Candidates for header sync: non-excluded, fewest errors first,
    /// most recently seen breaking ties.
    pub fn select_for_sync(&mut self, count: usize) -> Vec<SocketAddr> {
        let now = unix_now();
        let max = self.config.peer_max_errors;
        let cooldown = self.config.peer_cooldown_secs;

        let mut candidates: Vec<(u32, u64, SocketAddr)> = self
            .peers
            .values_mut()
            .filter_map(|p| {
                if p.is_excluded(max, cooldown, now) {
                    return None;
                }
                Some((p.errors, u64::MAX - p.last_seen, p.addr))
            })
            .collect();
        candidates.sort_unstable();
        candidates.into_iter().take(count).map(|(_, _, a)| a).collect()
    }

    /// The top-K peers worth persisting: proven ones first, then most
    /// recently seen.
    pub fn successful_peers(&self, k: usize) -> Vec<SocketAddr> {
        let mut proven: Vec<&PeerRecord> = self
            .peers
            .values()
            .filter(|p| p.proofs_ok > 0 || p.last_seen > 0)
            .collect();
        proven.sort_unstable_by(|a, b| {
            b.proofs_ok
                .cmp(&a.proofs_ok)
                .then(b.last_seen.cmp(&a.last_seen))
        });
        proven.into_iter().take(k).map(|p| p.addr).collect()
    }
}
