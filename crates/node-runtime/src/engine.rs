//! The engine: explicit construction and ownership of every subsystem.
//!
//! One `Engine` value owns the directory, the published tip, the query
//! pool, and the resolver; the header chain and store move into the sync
//! task at `start` (the chain is single-writer by construction). Tests
//! spin up independent engines against scratch directories.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use hns_01_header_chain::{sync_once, Checkpoint, HeaderChain, HeaderStore};
use hns_02_peer_network::adapters::{load_peers, save_peers};
use hns_02_peer_network::directory::ERROR_WEIGHT_HEAVY;
use hns_02_peer_network::{PeerDirectory, PeerSession, SeedSource};
use hns_03_name_resolver::{
    RecursiveResolver, Resolution, ResolveError, TipSnapshot, TipSource,
};
use shared_types::NetworkParams;

use crate::adapters::{DirectoryProofNetwork, SessionHeaderSource, SharedTip};
use crate::config::EngineConfig;
use crate::pool::QueryPool;

/// The root value wiring the SPV client together.
pub struct Engine {
    config: EngineConfig,
    params: NetworkParams,
    directory: Arc<Mutex<PeerDirectory>>,
    tip: Arc<SharedTip>,
    network: Arc<DirectoryProofNetwork>,
    resolver: Arc<RecursiveResolver>,
    pool: Arc<QueryPool>,
    stop: Arc<AtomicBool>,
    sync_task: Mutex<Option<JoinHandle<()>>>,
    keepalive_task: Mutex<Option<JoinHandle<()>>>,
    boot: Mutex<Option<(HeaderChain, HeaderStore)>>,
}

impl Engine {
    /// Build an engine: load the stored chain or bootstrap from the
    /// embedded checkpoint. The only fatal startup condition is ending up
    /// with no headers at all.
    pub fn bootstrap(
        config: EngineConfig,
        params: NetworkParams,
        checkpoint_blob: &[u8],
    ) -> anyhow::Result<Self> {
        let mut store = HeaderStore::open(
            &config.chain.data_dir,
            config.chain.header_save_checkpoint_window,
        )
        .context("opening header store")?;

        let checkpoint = Checkpoint::parse(checkpoint_blob, &params);
        let stored = store.load().context("loading header store")?;

        let chain = match (stored, checkpoint) {
            (Some(stored), Ok(checkpoint)) if stored.tip_height < checkpoint.tip_height() => {
                // Upgrade rotated the checkpoint past our stored chain:
                // discard and re-bootstrap from the new trust root.
                tracing::warn!(
                    "[runtime] stored tip {} behind embedded checkpoint {}, re-bootstrapping",
                    stored.tip_height,
                    checkpoint.tip_height()
                );
                store.clear()?;
                HeaderChain::from_checkpoint(
                    checkpoint,
                    config.chain.max_in_memory_headers,
                    config.chain.enforce_pow_target,
                )
            }
            (Some(stored), _) => HeaderChain::from_stored(
                stored.headers,
                stored.first_height,
                config.chain.max_in_memory_headers,
                config.chain.enforce_pow_target,
            )
            .context("stored chain failed validation")?,
            (None, Ok(checkpoint)) => HeaderChain::from_checkpoint(
                checkpoint,
                config.chain.max_in_memory_headers,
                config.chain.enforce_pow_target,
            ),
            (None, Err(e)) => {
                bail!("no stored headers and checkpoint rejected: {}", e);
            }
        };

        if chain.is_empty() {
            bail!("bootstrap produced an empty chain");
        }
        if store.last_saved_height().is_none() {
            store.force_save(&chain).context("initial save")?;
        }

        let tip_info = chain.tip_info();
        tracing::info!(
            "[runtime] chain ready at height {} ({} headers in memory)",
            tip_info.height,
            chain.len()
        );

        let tip = Arc::new(SharedTip::new(TipSnapshot {
            height: tip_info.height,
            name_root: tip_info.name_root,
        }));

        let mut directory = PeerDirectory::new(config.net.clone());
        let persisted = load_peers(&config.peers_file).unwrap_or_default();
        directory.seed(persisted, Vec::new(), params.bootstrap_peers);
        let directory = Arc::new(Mutex::new(directory));

        let network = Arc::new(DirectoryProofNetwork::new(
            Arc::clone(&directory),
            params.clone(),
            config.net.clone(),
            Arc::clone(&tip) as Arc<dyn TipSource>,
            config.peers_file.clone(),
        ));
        let resolver = Arc::new(RecursiveResolver::new(
            Arc::clone(&network) as _,
            Arc::clone(&tip) as Arc<dyn TipSource>,
            config.resolver.clone(),
        ));

        let pool = QueryPool::new(config.query_pool_slots, config.query_pool_waiting);

        Ok(Self {
            config,
            params,
            directory,
            tip,
            network,
            resolver,
            pool,
            stop: Arc::new(AtomicBool::new(false)),
            sync_task: Mutex::new(None),
            keepalive_task: Mutex::new(None),
            boot: Mutex::new(Some((chain, store))),
        })
    }

    /// Feed an external address source (DNS seeds, the DHT walker) into
    /// the directory.
    pub async fn seed_from(&self, source: &dyn SeedSource) {
        let found = source.lookup().await;
        if !found.is_empty() {
            tracing::info!(
                "[runtime] {} peers from {}",
                found.len(),
                source.source_id()
            );
            let mut directory = self.directory.lock();
            for addr in found {
                directory.add_peer(addr, false);
            }
        }
    }

    /// The current tip. Never suspends.
    pub fn tip(&self) -> TipSnapshot {
        self.tip.tip()
    }

    /// Resolve a DNS question through the bounded query pool.
    pub async fn resolve(
        &self,
        qname: &str,
        qtype: u16,
        qclass: u16,
    ) -> Result<Resolution, ResolveError> {
        let _slot = self.pool.acquire().await.map_err(|_| ResolveError::Busy)?;
        self.resolver.resolve(qname, qtype, qclass).await
    }

    /// Spawn the header sync loop. Idempotent: a second call is a no-op.
    pub fn start(&self) {
        let Some((chain, store)) = self.boot.lock().take() else {
            return;
        };
        let task = tokio::spawn(sync_loop(
            chain,
            store,
            Arc::clone(&self.directory),
            Arc::clone(&self.tip),
            Arc::clone(&self.stop),
            self.params.clone(),
            self.config.clone(),
        ));
        *self.sync_task.lock() = Some(task);

        let network = Arc::clone(&self.network);
        let stop = Arc::clone(&self.stop);
        let interval = Duration::from_secs(self.config.net.ping_interval_secs.max(1));
        let keepalive = tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                tokio::time::sleep(interval).await;
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                network.ping_idle().await;
            }
        });
        *self.keepalive_task.lock() = Some(keepalive);
    }

    /// Cooperative shutdown: stop the sync loop (it makes a final save)
    /// and persist the peer list.
    pub async fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        let task = self.sync_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("[runtime] sync task ended badly: {}", e);
            }
        }
        let keepalive = self.keepalive_task.lock().take();
        if let Some(keepalive) = keepalive {
            keepalive.abort();
            let _ = keepalive.await;
        }

        let top = {
            let directory = self.directory.lock();
            directory.successful_peers(self.config.net.persist_top_k)
        };
        if !top.is_empty() {
            if let Err(e) = save_peers(&self.config.peers_file, &top) {
                tracing::warn!("[runtime] could not persist peers on shutdown: {}", e);
            }
        }
        tracing::info!("[runtime] stopped at height {}", self.tip().height);
    }
}

/// The sync loop: pick a peer, run one round, publish the tip, repeat.
/// A batch rejection penalizes the peer and moves on to another.
async fn sync_loop(
    mut chain: HeaderChain,
    mut store: HeaderStore,
    directory: Arc<Mutex<PeerDirectory>>,
    tip: Arc<SharedTip>,
    stop: Arc<AtomicBool>,
    params: NetworkParams,
    config: EngineConfig,
) {
    while !stop.load(Ordering::Relaxed) {
        let candidates = {
            let mut directory = directory.lock();
            directory.select_for_sync(config.sync_peers)
        };
        if candidates.is_empty() {
            tracing::debug!("[runtime] no sync peers available");
        }

        let mut progressed = false;
        for addr in candidates {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let session = match PeerSession::connect(
                addr,
                &params,
                config.net.clone(),
                chain.tip_height(),
            )
            .await
            {
                Ok(session) => session,
                Err(e) => {
                    tracing::debug!("[runtime] sync connect {} failed: {}", addr, e);
                    directory.lock().record_error(addr, 1);
                    continue;
                }
            };

            if let Some(height) = session.peer_height() {
                chain.observe_network_height(height);
            }

            let source = SessionHeaderSource::new(session);
            match sync_once(&mut chain, &mut store, &source, &stop).await {
                Ok(outcome) => {
                    publish(&tip, &chain);
                    let mut session = source.into_session();
                    {
                        let mut directory = directory.lock();
                        if outcome.batch_rejected {
                            directory.record_error(addr, ERROR_WEIGHT_HEAVY);
                        } else {
                            directory.record_success(addr);
                        }
                        let gossiped = session.take_addrs();
                        if !gossiped.is_empty() {
                            directory.ingest_addrs(gossiped);
                        }
                    }
                    if outcome.appended > 0 {
                        progressed = true;
                    }
                    session.close().await;
                    if outcome.reached_tip || outcome.stopped {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!("[runtime] sync round on {} failed: {}", addr, e);
                    directory.lock().record_error(addr, 1);
                    source.into_session().close().await;
                }
            }
        }

        // Between rounds: short naps so the stop flag stays responsive.
        let interval = if progressed {
            Duration::from_millis(200)
        } else {
            Duration::from_secs(config.sync_interval_secs)
        };
        let mut slept = Duration::ZERO;
        while slept < interval && !stop.load(Ordering::Relaxed) {
            let step = Duration::from_millis(200).min(interval - slept);
            tokio::time::sleep(step).await;
            slept += step;
        }
    }

    if let Err(e) = store.force_save(&chain) {
        tracing::error!("[runtime] final save failed: {}", e);
    }
    publish(&tip, &chain);
}

fn publish(tip: &SharedTip, chain: &HeaderChain) {
    let info = chain.tip_info();
    tip.publish(TipSnapshot {
        height: info.height,
        name_root: info.name_root,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_03_name_resolver::dns::wire::{qclass, qtype, rcode, DnsMessage};

    fn test_checkpoint_blob(params: &NetworkParams) -> Vec<u8> {
        use hns_01_header_chain::Header;
        let mut prev = params.checkpoint_prev_hash;
        let mut headers = Vec::new();
        for i in 0..150u32 {
            let header = Header {
                nonce: i + 1,
                time: 1_700_000_000 + i as u64,
                prev_block: prev,
                name_root: [0xaa; 32],
                extra_nonce: [0; 24],
                reserved_root: [0; 32],
                witness_root: [0; 32],
                merkle_root: [0; 32],
                version: 0,
                bits: 0x207f_ffff,
                mask: [0; 32],
            };
            prev = header.pow_hash();
            headers.push(header);
        }
        Checkpoint {
            height: params.checkpoint_height,
            chainwork: [0x01; 32],
            headers,
        }
        .to_blob()
    }

    fn test_engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let params = NetworkParams::for_testing();
        let config = EngineConfig::for_testing(dir.path().to_path_buf());
        let blob = test_checkpoint_blob(&params);
        let engine = Engine::bootstrap(config, params, &blob).unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn test_cold_start_from_checkpoint() {
        let (engine, _dir) = test_engine();
        // 150 checkpoint headers: tip = checkpoint height + 149
        assert_eq!(engine.tip().height, NetworkParams::for_testing().checkpoint_height + 149);
    }

    #[tokio::test]
    async fn test_cold_start_resolve_is_servfail() {
        let (engine, _dir) = test_engine();
        // no peers reachable: resolving must fail closed, not hang
        let resolution = engine
            .resolve("example", qtype::A, qclass::IN)
            .await
            .unwrap();
        let Resolution::Answer(bytes) = resolution else {
            panic!("expected an answer");
        };
        assert_eq!(DnsMessage::decode(&bytes).unwrap().rcode(), rcode::SERVFAIL);
    }

    #[tokio::test]
    async fn test_bad_checkpoint_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let params = NetworkParams::for_testing();
        let config = EngineConfig::for_testing(dir.path().to_path_buf());
        let mut blob = test_checkpoint_blob(&params);
        blob[40] ^= 1; // corrupt the first header
        assert!(Engine::bootstrap(config, params, &blob).is_err());
    }

    #[tokio::test]
    async fn test_restart_uses_stored_chain() {
        let dir = tempfile::tempdir().unwrap();
        let params = NetworkParams::for_testing();
        let blob = test_checkpoint_blob(&params);

        {
            let config = EngineConfig::for_testing(dir.path().to_path_buf());
            let engine = Engine::bootstrap(config, params.clone(), &blob).unwrap();
            engine.start();
            engine.stop().await;
        }

        // Second boot with an *invalid* checkpoint still works: the
        // stored chain carries it.
        let config = EngineConfig::for_testing(dir.path().to_path_buf());
        let mut bad_blob = blob.clone();
        bad_blob.truncate(100);
        let engine = Engine::bootstrap(config, params.clone(), &bad_blob).unwrap();
        assert_eq!(engine.tip().height, params.checkpoint_height + 149);
    }
}
