//! Outbound ports: peers that serve proofs, and the chain tip.
//!
//! The query scheduler never touches sockets or the header chain; it
//! sees these traits. The peer-network adapter guarantees `candidates`
//! only ever returns handshaken peers; a peer that has not completed
//! version/verack is not asked.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use shared_types::{Hash, NameHash};

use crate::domain::ResolveError;

/// How a peer behaved during one query, for the directory's accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerOutcome {
    /// Served a verifying proof.
    ProofOk,
    /// Served an authoritative "not found". Counted lightly: a full node
    /// should have the name tree.
    NotFound,
    /// Served garbage or a non-verifying proof. Counted strongly.
    Garbage,
    /// Timed out or transport failed.
    Unreachable,
}

/// The peer pool as the query scheduler sees it.
#[async_trait]
pub trait ProofNetwork: Send + Sync {
    /// Ranked candidates for this name, best first, exclusions applied.
    async fn candidates(&self, name_hash: &NameHash) -> Vec<SocketAddr>;

    /// Issue `getproof` to one peer; returns the raw proof envelope.
    async fn fetch_proof(
        &self,
        peer: SocketAddr,
        name_hash: NameHash,
        root: Hash,
    ) -> Result<Vec<u8>, ResolveError>;

    /// Feed the query outcome back into peer accounting.
    async fn report(&self, peer: SocketAddr, outcome: PeerOutcome);
}

/// A copyable view of the chain tip taken at query entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TipSnapshot {
    /// Tip height.
    pub height: u32,
    /// Name-tree root at the tip.
    pub name_root: Hash,
}

/// Non-suspending access to the current tip.
pub trait TipSource: Send + Sync {
    /// The tip right now.
    fn tip(&self) -> TipSnapshot;
}

impl TipSource for TipSnapshot {
    fn tip(&self) -> TipSnapshot {
        *self
    }
}

/// Scripted reply for one mock peer.
#[derive(Clone, Debug)]
pub enum MockReply {
    /// Serve these envelope bytes.
    Envelope(Vec<u8>),
    /// Fail with a transport error.
    Error,
    /// Never answer (for cancellation tests).
    Hang,
}

/// In-memory proof network for tests.
pub struct MockProofNetwork {
    /// Candidate order handed to the scheduler.
    pub peers: Vec<SocketAddr>,
    /// Scripted reply per peer.
    pub replies: HashMap<SocketAddr, MockReply>,
    /// Outcome reports, in arrival order.
    pub reports: Mutex<Vec<(SocketAddr, PeerOutcome)>>,
}

impl MockProofNetwork {
    /// A network serving the given scripted replies.
    pub fn new(replies: Vec<(SocketAddr, MockReply)>) -> Self {
        Self {
            peers: replies.iter().map(|(a, _)| *a).collect(),
            replies: replies.into_iter().collect(),
            reports: Mutex::new(Vec::new()),
        }
    }

    /// Outcomes reported for one peer.
    pub fn outcomes_for(&self, peer: SocketAddr) -> Vec<PeerOutcome> {
        self.reports
            .lock()
            .expect("reports lock")
            .iter()
            .filter(|(a, _)| *a == peer)
            .map(|(_, o)| *o)
            .collect()
    }
}

#[async_trait]
impl ProofNetwork for MockProofNetwork {
    async fn candidates(&self, _name_hash: &NameHash) -> Vec<SocketAddr> {
        self.peers.clone()
    }

    async fn fetch_proof(
        &self,
        peer: SocketAddr,
        _name_hash: NameHash,
        _root: Hash,
    ) -> Result<Vec<u8>, ResolveError> {
        match self.replies.get(&peer) {
            Some(MockReply::Envelope(bytes)) => Ok(bytes.clone()),
            Some(MockReply::Error) | None => Err(ResolveError::Network {
                message: "mock failure".to_string(),
            }),
            Some(MockReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("hung mock peer answered")
            }
        }
    }

    async fn report(&self, peer: SocketAddr, outcome: PeerOutcome) {
        self.reports.lock().expect("reports lock").push((peer, outcome));
    }
}
