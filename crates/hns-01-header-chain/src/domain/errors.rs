//! Header chain error types.

use shared_types::Hash;
use thiserror::Error;

/// Everything that can go wrong between a byte buffer and an accepted
/// header, or between the chain and its on-disk copy.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Malformed bytes: wrong header length, bad varint, bad envelope.
    #[error("format error: {reason}")]
    Format {
        /// What was malformed.
        reason: String,
    },

    /// A header's `prev_block` does not match the current tip hash.
    #[error("link mismatch at height {height}")]
    LinkMismatch {
        /// Height the header would have occupied.
        height: u32,
        /// Our tip hash.
        expected: Hash,
        /// The header's `prev_block`.
        got: Hash,
    },

    /// Appending would exceed the highest height any peer has announced.
    #[error("height {height} overshoots network height {network_height}")]
    Overshoot {
        /// Height the header would have occupied.
        height: u32,
        /// Highest announced network height.
        network_height: u32,
    },

    /// The header hash does not meet the target derived from `bits`.
    #[error("proof-of-work below target at height {height}")]
    PowTarget {
        /// Height the header would have occupied.
        height: u32,
    },

    /// `bits` does not decode to a usable target.
    #[error("invalid compact bits 0x{bits:08x}")]
    BadBits {
        /// The offending compact value.
        bits: u32,
    },

    /// The embedded checkpoint blob failed validation.
    #[error("checkpoint rejected: {reason}")]
    CheckpointRejected {
        /// Which validation failed.
        reason: String,
    },

    /// The store envelope bytes do not match the companion checksum.
    #[error("header store checksum mismatch")]
    ChecksumMismatch,

    /// Disk I/O failure in the header store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure reported by a header source.
    #[error("header source error: {message}")]
    Source {
        /// What the source reported.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_mismatch_display() {
        let err = ChainError::LinkMismatch {
            height: 42,
            expected: [0u8; 32],
            got: [1u8; 32],
        };
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_overshoot_display() {
        let err = ChainError::Overshoot {
            height: 101,
            network_height: 100,
        };
        assert!(err.to_string().contains("101"));
        assert!(err.to_string().contains("100"));
    }
}
