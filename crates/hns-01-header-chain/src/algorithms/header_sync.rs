//! The `getheaders` sync loop.
//!
//! One round against one source: build a locator, request headers, append
//! until the source runs dry or a header is rejected. A link mismatch
//! aborts the batch (possible reorg or bad peer, the caller decides); an
//! overshoot halts quietly until a higher network height is announced.
//! The stop flag is checked between headers and partial progress is
//! always persisted.

use std::sync::atomic::{AtomicBool, Ordering};

use shared_types::short_hash;

use crate::adapters::HeaderStore;
use crate::domain::{ChainError, HeaderChain};
use crate::ports::HeaderSource;

/// What one sync round did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Headers accepted this round.
    pub appended: u64,
    /// Tip reached the announced network height.
    pub reached_tip: bool,
    /// A batch was aborted on a rejected header; the source is suspect.
    pub batch_rejected: bool,
    /// Appending stopped at the announced network height.
    pub halted_on_overshoot: bool,
    /// The cooperative stop flag ended the round.
    pub stopped: bool,
}

/// Run one sync round against `source`.
pub async fn sync_once(
    chain: &mut HeaderChain,
    store: &mut HeaderStore,
    source: &dyn HeaderSource,
    stop: &AtomicBool,
) -> Result<SyncOutcome, ChainError> {
    let mut outcome = SyncOutcome::default();

    loop {
        if stop.load(Ordering::Relaxed) {
            outcome.stopped = true;
            break;
        }

        if let Some(height) = source.network_height().await {
            chain.observe_network_height(height);
        }
        if let Some(network_height) = chain.known_network_height() {
            if chain.tip_height() >= network_height {
                outcome.reached_tip = true;
                break;
            }
        }

        let locator = chain.locator();
        let headers = match source.get_headers(locator, [0u8; 32]).await {
            Ok(headers) => headers,
            Err(e) => {
                save_partial(chain, store, &outcome);
                return Err(e);
            }
        };
        if headers.is_empty() {
            // Source has nothing past our locator; nothing to do until it
            // announces more.
            break;
        }

        let mut batch_done = false;
        for header in headers {
            if stop.load(Ordering::Relaxed) {
                outcome.stopped = true;
                batch_done = true;
                break;
            }
            match chain.append(header) {
                Ok(()) => {
                    outcome.appended += 1;
                    store.record_append(chain)?;
                }
                Err(ChainError::Overshoot { height, network_height }) => {
                    tracing::debug!(
                        "[hns-01] halting at network height {} (next header {})",
                        network_height,
                        height
                    );
                    outcome.halted_on_overshoot = true;
                    batch_done = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        "[hns-01] batch from {} aborted at height {}: {}",
                        source.source_id(),
                        chain.tip_height() + 1,
                        e
                    );
                    outcome.batch_rejected = true;
                    batch_done = true;
                    break;
                }
            }
        }
        if batch_done {
            break;
        }
    }

    let dropped = chain.cap_to_network_height();
    if dropped > 0 || outcome.appended > 0 || outcome.stopped {
        store.force_save(chain)?;
    }

    if outcome.appended > 0 {
        tracing::info!(
            "[hns-01] synced {} headers from {}, tip {} ({})",
            outcome.appended,
            source.source_id(),
            chain.tip_height(),
            short_hash(&chain.tip_hash())
        );
    }
    Ok(outcome)
}

fn save_partial(chain: &HeaderChain, store: &mut HeaderStore, outcome: &SyncOutcome) {
    if outcome.appended > 0 {
        if let Err(e) = store.force_save(chain) {
            tracing::error!("[hns-01] failed to persist partial sync: {}", e);
        }
    }
}
