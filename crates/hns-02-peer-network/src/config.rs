//! Peer network configuration.

use serde::{Deserialize, Serialize};

/// Timing and limit knobs for sessions and the directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for a single framed request/response in milliseconds.
    pub socket_timeout_ms: u64,

    /// Both the peer's `version` and its `verack` must arrive within this
    /// window or the session fails.
    pub handshake_timeout_ms: u64,

    /// Connect attempts per peer before giving up.
    pub max_retries: u32,

    /// Base delay for exponential connect backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Upper bound on an incoming frame payload.
    pub max_message_size: u32,

    /// Request failures a session tolerates before it is closed.
    pub session_max_errors: u32,

    /// Directory exclusion threshold.
    pub peer_max_errors: u32,

    /// How long an excluded peer stays out, in seconds.
    pub peer_cooldown_secs: u64,

    /// Successful peers persisted after a query (top-K).
    pub persist_top_k: usize,

    /// Seconds between liveness pings on idle sessions.
    pub ping_interval_secs: u64,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 10_000,
            handshake_timeout_ms: 10_000,
            max_retries: 3,
            retry_base_delay_ms: 500,
            max_message_size: shared_types::network::MAX_MESSAGE_SIZE,
            session_max_errors: 3,
            peer_max_errors: 5,
            peer_cooldown_secs: 600,
            persist_top_k: 50,
            ping_interval_secs: 60,
        }
    }
}

impl NetConfig {
    /// Config for tests: short deadlines, tiny cooldown.
    pub fn for_testing() -> Self {
        Self {
            connect_timeout_ms: 1_000,
            socket_timeout_ms: 1_000,
            handshake_timeout_ms: 1_000,
            max_retries: 1,
            retry_base_delay_ms: 10,
            peer_cooldown_secs: 1,
            ping_interval_secs: 2,
            ..Self::default()
        }
    }
}
