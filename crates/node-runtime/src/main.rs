//! The `hns-light` daemon.
//!
//! Boots the engine from the checkpoint blob, runs header sync, and
//! holds the resolver ready for the DoH/DoT front ends. A missing or
//! invalid checkpoint is the one fatal startup condition. Shutdown on
//! ctrl-c makes a final header save.

use anyhow::Context;
use node_runtime::{Engine, EngineConfig};
use shared_types::NetworkParams;

/// Where the shipped checkpoint blob lives unless `HNS_CHECKPOINT_FILE`
/// points elsewhere.
const DEFAULT_CHECKPOINT_PATH: &str = "checkpoint/mainnet.bin";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    node_runtime::telemetry::init();

    let config = EngineConfig::from_env();
    let params = NetworkParams::mainnet();

    let path = std::env::var("HNS_CHECKPOINT_FILE")
        .ok()
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_CHECKPOINT_PATH.to_string());
    let blob = std::fs::read(&path)
        .with_context(|| format!("reading checkpoint blob {}", path))?;

    let engine = Engine::bootstrap(config, params, &blob)?;
    engine.start();
    tracing::info!("hns-light running, tip height {}", engine.tip().height);

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    engine.stop().await;
    Ok(())
}
