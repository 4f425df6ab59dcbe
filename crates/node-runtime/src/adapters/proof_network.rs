//! The peer directory and session pool as a `ProofNetwork`.
//!
//! Sessions are created on demand per peer and cached while healthy, so
//! a batch of parallel `getproof` requests runs one session per peer.
//! Outcome reports flow back into the directory as events; the directory
//! never holds a session and sessions never point at the directory.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use hns_02_peer_network::adapters::save_peers;
use hns_02_peer_network::directory::{ERROR_WEIGHT_HEAVY, ERROR_WEIGHT_LIGHT};
use hns_02_peer_network::{NetConfig, NetError, PeerDirectory, PeerSession};
use hns_03_name_resolver::{PeerOutcome, ProofNetwork, ResolveError, TipSource};
use shared_types::{Hash, NameHash, NetworkParams};

type SessionMap = HashMap<SocketAddr, Arc<AsyncMutex<PeerSession>>>;

/// Live `ProofNetwork` over the directory and a per-peer session cache.
pub struct DirectoryProofNetwork {
    directory: Arc<Mutex<PeerDirectory>>,
    sessions: AsyncMutex<SessionMap>,
    params: NetworkParams,
    net_config: NetConfig,
    tip: Arc<dyn TipSource>,
    peers_file: PathBuf,
    candidates_per_query: usize,
    persist_top_k: usize,
}

impl DirectoryProofNetwork {
    /// Wire the adapter up.
    pub fn new(
        directory: Arc<Mutex<PeerDirectory>>,
        params: NetworkParams,
        net_config: NetConfig,
        tip: Arc<dyn TipSource>,
        peers_file: PathBuf,
    ) -> Self {
        let persist_top_k = net_config.persist_top_k;
        Self {
            directory,
            sessions: AsyncMutex::new(HashMap::new()),
            params,
            net_config,
            tip,
            peers_file,
            candidates_per_query: 16,
            persist_top_k,
        }
    }

    /// A READY session for `peer`, reusing a cached one when possible.
    /// Peers are only ever queried through a completed handshake.
    async fn session_for(
        &self,
        peer: SocketAddr,
    ) -> Result<Arc<AsyncMutex<PeerSession>>, NetError> {
        // Never await a session lock while holding the map lock; a busy
        // session would stall every other peer's lookup.
        let cached = { self.sessions.lock().await.get(&peer).cloned() };
        if let Some(session) = cached {
            if session.lock().await.is_ready() {
                return Ok(session);
            }
            self.sessions.lock().await.remove(&peer);
        }

        // Connect without holding the map lock so parallel batch members
        // do not serialize behind one slow handshake.
        let our_height = self.tip.tip().height;
        let session =
            PeerSession::connect(peer, &self.params, self.net_config.clone(), our_height).await?;
        if let Some(height) = session.peer_height() {
            tracing::trace!("[runtime] {} announces height {}", peer, height);
        }
        let session = Arc::new(AsyncMutex::new(session));
        self.sessions
            .lock()
            .await
            .insert(peer, Arc::clone(&session));
        Ok(session)
    }

    /// Liveness pass: ping every cached session, dropping the ones that
    /// miss their pong.
    pub async fn ping_idle(&self) {
        let sessions: Vec<(SocketAddr, Arc<AsyncMutex<PeerSession>>)> = {
            let map = self.sessions.lock().await;
            map.iter().map(|(a, s)| (*a, Arc::clone(s))).collect()
        };
        for (addr, session) in sessions {
            let alive = {
                let mut guard = session.lock().await;
                guard.is_ready() && guard.ping().await.is_ok()
            };
            if !alive {
                tracing::debug!("[runtime] dropping idle session {}", addr);
                self.drop_session(addr).await;
            }
        }
    }

    async fn drop_session(&self, peer: SocketAddr) {
        let removed = { self.sessions.lock().await.remove(&peer) };
        if let Some(session) = removed {
            session.lock().await.close().await;
        }
    }
}

#[async_trait]
impl ProofNetwork for DirectoryProofNetwork {
    async fn candidates(&self, name_hash: &NameHash) -> Vec<SocketAddr> {
        self.directory
            .lock()
            .select_for_name(name_hash, self.candidates_per_query)
    }

    async fn fetch_proof(
        &self,
        peer: SocketAddr,
        name_hash: NameHash,
        root: Hash,
    ) -> Result<Vec<u8>, ResolveError> {
        let session = self.session_for(peer).await.map_err(|e| ResolveError::Network {
            message: e.to_string(),
        })?;

        let mut guard = session.lock().await;
        // a session gossips addresses; fold them into discovery
        let gossiped = guard.take_addrs();
        if !gossiped.is_empty() {
            self.directory.lock().ingest_addrs(gossiped);
        }

        match guard.request_proof(name_hash, root).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                let closed = !guard.is_ready();
                drop(guard);
                if closed {
                    self.drop_session(peer).await;
                }
                Err(ResolveError::Network {
                    message: e.to_string(),
                })
            }
        }
    }

    async fn report(&self, peer: SocketAddr, outcome: PeerOutcome) {
        let persist = {
            let mut directory = self.directory.lock();
            match outcome {
                PeerOutcome::ProofOk => {
                    directory.record_success(peer);
                    Some(directory.successful_peers(self.persist_top_k))
                }
                PeerOutcome::NotFound => {
                    directory.record_error(peer, ERROR_WEIGHT_LIGHT);
                    None
                }
                PeerOutcome::Garbage => {
                    directory.record_error(peer, ERROR_WEIGHT_HEAVY);
                    None
                }
                PeerOutcome::Unreachable => {
                    directory.record_error(peer, ERROR_WEIGHT_LIGHT);
                    None
                }
            }
        };

        if let Some(top) = persist {
            if let Err(e) = save_peers(&self.peers_file, &top) {
                tracing::warn!("[runtime] could not persist peers: {}", e);
            }
        }
    }
}
