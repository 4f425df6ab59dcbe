//! Resolver error types.

use thiserror::Error;

/// Failures between a DNS question and a verified answer.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Malformed proof envelope or DNS message.
    #[error("format error: {reason}")]
    Format {
        /// What was malformed.
        reason: String,
    },

    /// A proof did not fold to the expected name root. The serving peer
    /// is byzantine for this query; never fall back upstream.
    #[error("proof does not verify: {reason}")]
    Proof {
        /// Why verification failed.
        reason: String,
    },

    /// Every candidate peer failed or timed out.
    #[error("no peer produced a verifying proof")]
    AllPeersFailed,

    /// The question is not answerable (empty name, unsupported class).
    #[error("bad question: {reason}")]
    BadQuestion {
        /// What was wrong with it.
        reason: String,
    },

    /// Backpressure refusal from the query pool.
    #[error("resolver busy")]
    Busy,

    /// Transport failure talking to a peer or a glue nameserver.
    #[error("network error: {message}")]
    Network {
        /// What the transport reported.
        message: String,
    },

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
