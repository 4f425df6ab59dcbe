//! End-to-end flows against a live engine.

mod resolve_flows;
mod sync_flows;

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use node_runtime::{Engine, EngineConfig};
use shared_types::NetworkParams;

use hns_02_peer_network::StaticSeeds;

/// Build and seed an engine rooted in `dir`.
pub async fn engine_with(
    dir: &Path,
    params: &NetworkParams,
    blob: &[u8],
    peers: &[SocketAddr],
    tweak: impl FnOnce(&mut EngineConfig),
) -> Engine {
    let mut config = EngineConfig::for_testing(dir.to_path_buf());
    tweak(&mut config);
    let engine = Engine::bootstrap(config, params.clone(), blob).expect("bootstrap");
    if !peers.is_empty() {
        engine
            .seed_from(&StaticSeeds::new(peers.to_vec(), "test-seeds"))
            .await;
    }
    engine
}

/// Poll until `probe` returns true or the deadline passes.
pub async fn wait_for<F, Fut>(what: &str, deadline: Duration, mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let step = Duration::from_millis(100);
    let mut waited = Duration::ZERO;
    loop {
        if probe().await {
            return;
        }
        if waited >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(step).await;
        waited += step;
    }
}
