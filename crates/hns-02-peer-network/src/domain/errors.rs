//! Peer network error types.

use thiserror::Error;

/// Failures on the wire or in a session.
#[derive(Debug, Error)]
pub enum NetError {
    /// Malformed frame or payload: bad length, bad varint, oversize.
    /// Recovered locally by dropping the frame and closing the session.
    #[error("format error: {reason}")]
    Format {
        /// What was malformed.
        reason: String,
    },

    /// Protocol violation: magic mismatch, unexpected message, handshake
    /// not completed. Closes the session and counts against the peer.
    #[error("protocol error: {reason}")]
    Protocol {
        /// What the peer did wrong.
        reason: String,
    },

    /// A deadline elapsed.
    #[error("timed out waiting for {what}")]
    Timeout {
        /// What we were waiting for.
        what: String,
    },

    /// The session is not in a state that can carry requests.
    #[error("session closed")]
    Closed,

    /// Backpressure refusal.
    #[error("busy")]
    Busy,

    /// Socket I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NetError {
    /// Whether this failure should count strongly against the peer
    /// (protocol violations) rather than lightly (timeouts, transport).
    pub fn is_protocol_fault(&self) -> bool {
        matches!(self, NetError::Format { .. } | NetError::Protocol { .. })
    }
}
