//! Embedded checkpoint blob.
//!
//! `height(4 BE) || chainwork(32 BE) || 150 x Header(236 LE)`, 35,436
//! bytes total. The blob ships with the binary and is the trust root of
//! the whole client, so validation is strict: exact size, declared height,
//! internal linkage, and fixed nonce witnesses on the first and last
//! header. Any failure returns an error without touching chain state.

use shared_types::network::{CHECKPOINT_BLOB_SIZE, CHECKPOINT_HEADERS, HEADER_SIZE};
use shared_types::NetworkParams;

use super::errors::ChainError;
use super::header::Header;

/// A validated checkpoint: trusted height, accumulated chainwork, and a
/// window of consecutive headers.
#[derive(Clone, Debug)]
pub struct Checkpoint {
    /// Height of the first header in the window.
    pub height: u32,
    /// Accumulated chainwork at the checkpoint, big-endian.
    pub chainwork: [u8; 32],
    /// The header window, oldest first.
    pub headers: Vec<Header>,
}

impl Checkpoint {
    /// Parse and validate an embedded checkpoint blob.
    pub fn parse(blob: &[u8], params: &NetworkParams) -> Result<Self, ChainError> {
        if blob.len() != CHECKPOINT_BLOB_SIZE {
            return Err(ChainError::CheckpointRejected {
                reason: format!("size {} != {}", blob.len(), CHECKPOINT_BLOB_SIZE),
            });
        }

        let height = u32::from_be_bytes(blob[0..4].try_into().expect("4 bytes"));
        if height != params.checkpoint_height {
            return Err(ChainError::CheckpointRejected {
                reason: format!(
                    "declared height {} != configured {}",
                    height, params.checkpoint_height
                ),
            });
        }

        let mut chainwork = [0u8; 32];
        chainwork.copy_from_slice(&blob[4..36]);

        let mut headers = Vec::with_capacity(CHECKPOINT_HEADERS);
        for i in 0..CHECKPOINT_HEADERS {
            let start = 36 + i * HEADER_SIZE;
            headers.push(Header::decode(&blob[start..start + HEADER_SIZE])?);
        }

        for i in 1..headers.len() {
            let expected = headers[i - 1].pow_hash();
            if headers[i].prev_block != expected {
                return Err(ChainError::CheckpointRejected {
                    reason: format!("broken link at offset {}", i),
                });
            }
        }

        let first = headers.first().expect("150 headers");
        let last = headers.last().expect("150 headers");
        if first.nonce != params.checkpoint_first_nonce {
            return Err(ChainError::CheckpointRejected {
                reason: format!("first nonce 0x{:08x} unexpected", first.nonce),
            });
        }
        if last.nonce != params.checkpoint_last_nonce {
            return Err(ChainError::CheckpointRejected {
                reason: format!("last nonce 0x{:08x} unexpected", last.nonce),
            });
        }

        tracing::info!(
            "[hns-01] checkpoint accepted: height {}, {} headers",
            height,
            headers.len()
        );

        Ok(Self {
            height,
            chainwork,
            headers,
        })
    }

    /// Height of the last header in the window.
    pub fn tip_height(&self) -> u32 {
        self.height + self.headers.len() as u32 - 1
    }

    /// Serialize back to the blob layout. Used by tests and by tooling
    /// that produces upgrade checkpoints.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CHECKPOINT_BLOB_SIZE);
        out.extend_from_slice(&self.height.to_be_bytes());
        out.extend_from_slice(&self.chainwork);
        for header in &self.headers {
            out.extend_from_slice(&header.encode());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Hash;

    fn linked(prev: Hash, n: usize) -> Vec<Header> {
        let mut prev = prev;
        let mut out = Vec::new();
        for i in 0..n {
            let header = Header {
                nonce: i as u32 + 1,
                time: 1_600_000_000 + i as u64,
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
            out.push(header);
        }
        out
    }

    fn params() -> NetworkParams {
        NetworkParams::for_testing()
    }

    pub(crate) fn test_blob(params: &NetworkParams) -> Vec<u8> {
        let headers = linked(params.checkpoint_prev_hash, CHECKPOINT_HEADERS);
        let cp = Checkpoint {
            height: params.checkpoint_height,
            chainwork: [0x01; 32],
            headers,
        };
        cp.to_blob()
    }

    #[test]
    fn test_parse_valid_blob() {
        let params = params();
        let blob = test_blob(&params);
        assert_eq!(blob.len(), CHECKPOINT_BLOB_SIZE);
        let cp = Checkpoint::parse(&blob, &params).unwrap();
        assert_eq!(cp.height, params.checkpoint_height);
        assert_eq!(cp.headers.len(), CHECKPOINT_HEADERS);
        assert_eq!(cp.tip_height(), params.checkpoint_height + 149);
    }

    #[test]
    fn test_blob_roundtrip() {
        let params = params();
        let blob = test_blob(&params);
        let cp = Checkpoint::parse(&blob, &params).unwrap();
        assert_eq!(cp.to_blob(), blob);
    }

    #[test]
    fn test_wrong_size_rejected() {
        let params = params();
        let mut blob = test_blob(&params);
        blob.pop();
        assert!(matches!(
            Checkpoint::parse(&blob, &params),
            Err(ChainError::CheckpointRejected { .. })
        ));
    }

    #[test]
    fn test_wrong_height_rejected() {
        let params = params();
        let mut blob = test_blob(&params);
        blob[3] ^= 1;
        assert!(matches!(
            Checkpoint::parse(&blob, &params),
            Err(ChainError::CheckpointRejected { .. })
        ));
    }

    #[test]
    fn test_broken_link_rejected() {
        let params = params();
        let mut blob = test_blob(&params);
        // corrupt the prev_block of the 10th header
        let offset = 36 + 9 * HEADER_SIZE + 12;
        blob[offset] ^= 1;
        assert!(matches!(
            Checkpoint::parse(&blob, &params),
            Err(ChainError::CheckpointRejected { .. })
        ));
    }

    #[test]
    fn test_wrong_nonce_witness_rejected() {
        let params = params();
        let headers = linked(params.checkpoint_prev_hash, CHECKPOINT_HEADERS);
        let mut cp = Checkpoint {
            height: params.checkpoint_height,
            chainwork: [0x01; 32],
            headers,
        };
        cp.headers[0].nonce = 0xdead_beef;
        // relink after the nonce change
        for i in 1..cp.headers.len() {
            cp.headers[i].prev_block = cp.headers[i - 1].pow_hash();
        }
        let blob = cp.to_blob();
        assert!(matches!(
            Checkpoint::parse(&blob, &params),
            Err(ChainError::CheckpointRejected { .. })
        ));
    }
}
