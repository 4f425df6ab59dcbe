//! Runtime configuration.
//!
//! Aggregates the per-subsystem configs and overlays `HNS_*` environment
//! variables, the way the daemon is configured in deployment.

use std::path::PathBuf;

use hns_01_header_chain::ChainConfig;
use hns_02_peer_network::NetConfig;
use hns_03_name_resolver::ResolverConfig;

/// Everything the engine needs to run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Header chain knobs.
    pub chain: ChainConfig,
    /// Peer network knobs.
    pub net: NetConfig,
    /// Resolver knobs.
    pub resolver: ResolverConfig,
    /// Where the persisted peer list lives.
    pub peers_file: PathBuf,
    /// Peers tried per sync round.
    pub sync_peers: usize,
    /// Seconds between sync rounds once at the network tip.
    pub sync_interval_secs: u64,
    /// Concurrent name queries.
    pub query_pool_slots: usize,
    /// Queued name queries beyond the pool before the oldest is refused.
    pub query_pool_waiting: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let chain = ChainConfig::default();
        let peers_file = chain.data_dir.join("peers.bin");
        Self {
            chain,
            net: NetConfig::default(),
            resolver: ResolverConfig::default(),
            peers_file,
            sync_peers: 3,
            sync_interval_secs: 30,
            query_pool_slots: 8,
            query_pool_waiting: 32,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `HNS_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env_var("HNS_DATA_DIR") {
            config.chain.data_dir = PathBuf::from(&dir);
            config.peers_file = config.chain.data_dir.join("peers.bin");
        }
        read_env("HNS_MAX_IN_MEMORY_HEADERS", &mut config.chain.max_in_memory_headers);
        read_env(
            "HNS_HEADER_SAVE_WINDOW",
            &mut config.chain.header_save_checkpoint_window,
        );
        read_env("HNS_ENFORCE_POW_TARGET", &mut config.chain.enforce_pow_target);

        read_env("HNS_P2P_CONNECT_TIMEOUT_MS", &mut config.net.connect_timeout_ms);
        read_env("HNS_P2P_SOCKET_TIMEOUT_MS", &mut config.net.socket_timeout_ms);
        read_env("HNS_P2P_MAX_RETRIES", &mut config.net.max_retries);
        read_env(
            "HNS_P2P_RETRY_BASE_DELAY_MS",
            &mut config.net.retry_base_delay_ms,
        );
        read_env("HNS_MAX_MESSAGE_SIZE", &mut config.net.max_message_size);
        read_env("HNS_PEER_MAX_ERRORS", &mut config.net.peer_max_errors);

        read_env("HNS_NAME_QUERY_THREADS", &mut config.resolver.name_query_threads);
        read_env(
            "HNS_DNS_CACHE_TTL_SECONDS",
            &mut config.resolver.dns_cache_ttl_seconds,
        );
        read_env(
            "HNS_MAX_RECURSION_DEPTH",
            &mut config.resolver.max_recursion_depth,
        );

        read_env("HNS_SYNC_INTERVAL_SECS", &mut config.sync_interval_secs);
        read_env("HNS_QUERY_POOL_SLOTS", &mut config.query_pool_slots);

        config
    }

    /// Config for tests rooted in a scratch directory.
    pub fn for_testing(data_dir: PathBuf) -> Self {
        let peers_file = data_dir.join("peers.bin");
        Self {
            chain: ChainConfig::for_testing(data_dir),
            net: NetConfig::for_testing(),
            resolver: ResolverConfig::for_testing(),
            peers_file,
            sync_peers: 2,
            sync_interval_secs: 1,
            query_pool_slots: 4,
            query_pool_waiting: 4,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn read_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Some(raw) = env_var(key) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("[runtime] ignoring unparseable {}={}", key, raw),
        }
    }
}
