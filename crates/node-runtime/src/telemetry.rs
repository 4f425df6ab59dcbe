//! Tracing setup for the daemon.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber. `HNS_LOG` carries the filter
/// (`info`, `hns_02_peer_network=debug`, ...); default is `info`.
pub fn init() {
    let filter = EnvFilter::try_from_env("HNS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
