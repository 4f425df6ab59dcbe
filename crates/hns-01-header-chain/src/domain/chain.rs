//! In-memory header chain window.
//!
//! Single-writer: only the sync loop appends. Readers take the tip, which
//! always stays in memory regardless of trimming.

use std::collections::VecDeque;

use primitive_types::U256;
use shared_types::Hash;

use super::checkpoint::Checkpoint;
use super::errors::ChainError;
use super::header::Header;

/// Snapshot of the tip, cheap to copy out under a lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TipInfo {
    /// Height of the highest accepted header.
    pub height: u32,
    /// Hash of the highest accepted header.
    pub hash: Hash,
    /// Name-tree root at the tip; what proofs verify against.
    pub name_root: Hash,
}

/// The header sequence from `first_height` to the tip, bounded in memory.
#[derive(Debug)]
pub struct HeaderChain {
    headers: VecDeque<Header>,
    first_height: u32,
    tip_hash: Hash,
    known_network_height: Option<u32>,
    max_in_memory: usize,
    enforce_pow_target: bool,
}

impl HeaderChain {
    /// Bootstrap from a validated checkpoint.
    pub fn from_checkpoint(
        checkpoint: Checkpoint,
        max_in_memory: usize,
        enforce_pow_target: bool,
    ) -> Self {
        let tip_hash = checkpoint
            .headers
            .last()
            .map(Header::pow_hash)
            .unwrap_or([0u8; 32]);
        let mut chain = Self {
            headers: checkpoint.headers.into(),
            first_height: checkpoint.height,
            tip_hash,
            known_network_height: None,
            max_in_memory,
            enforce_pow_target,
        };
        chain.trim_excess();
        chain
    }

    /// Rebuild from a loaded store window. The window must be internally
    /// linked; a broken link rejects the whole load and forces
    /// re-bootstrap.
    pub fn from_stored(
        headers: Vec<Header>,
        first_height: u32,
        max_in_memory: usize,
        enforce_pow_target: bool,
    ) -> Result<Self, ChainError> {
        if headers.is_empty() {
            return Err(ChainError::Format {
                reason: "empty stored chain".to_string(),
            });
        }
        for i in 1..headers.len() {
            let expected = headers[i - 1].pow_hash();
            if headers[i].prev_block != expected {
                return Err(ChainError::LinkMismatch {
                    height: first_height + i as u32,
                    expected,
                    got: headers[i].prev_block,
                });
            }
        }
        let tip_hash = headers.last().map(Header::pow_hash).expect("non-empty");
        let mut chain = Self {
            headers: headers.into(),
            first_height,
            tip_hash,
            known_network_height: None,
            max_in_memory,
            enforce_pow_target,
        };
        chain.trim_excess();
        Ok(chain)
    }

    /// Append a header: link, overshoot, and (when enforced) target checks.
    /// The append is atomic; a rejected header leaves the chain untouched.
    pub fn append(&mut self, header: Header) -> Result<(), ChainError> {
        let height = self.tip_height() + 1;

        if header.prev_block != self.tip_hash {
            return Err(ChainError::LinkMismatch {
                height,
                expected: self.tip_hash,
                got: header.prev_block,
            });
        }

        if let Some(network_height) = self.known_network_height {
            if height > network_height {
                return Err(ChainError::Overshoot {
                    height,
                    network_height,
                });
            }
        }

        let hash = header.pow_hash();
        if self.enforce_pow_target {
            let target = header.pow_target()?;
            if U256::from_big_endian(&hash) > target {
                return Err(ChainError::PowTarget { height });
            }
        }

        self.headers.push_back(header);
        self.tip_hash = hash;
        self.trim_excess();
        Ok(())
    }

    /// Record a height announced by a handshaken peer.
    pub fn observe_network_height(&mut self, height: u32) {
        let current = self.known_network_height.unwrap_or(0);
        if height > current {
            self.known_network_height = Some(height);
        }
    }

    /// Drop any headers above the announced network height. Returns how
    /// many were dropped.
    pub fn cap_to_network_height(&mut self) -> usize {
        let Some(network_height) = self.known_network_height else {
            return 0;
        };
        let mut dropped = 0;
        while self.tip_height() > network_height && self.headers.len() > 1 {
            self.headers.pop_back();
            dropped += 1;
        }
        if dropped > 0 {
            self.tip_hash = self.tip().pow_hash();
            tracing::warn!(
                "[hns-01] dropped {} headers above network height {}",
                dropped,
                network_height
            );
        }
        dropped
    }

    /// Sparse locator for `getheaders`: tip, then strides of 10, 100,
    /// 1000, ... back through the window, then the first in-memory header.
    pub fn locator(&self) -> Vec<Hash> {
        let mut locator = vec![self.tip_hash];
        let tip = self.tip_height();
        let mut stride = 10u32;
        loop {
            let Some(height) = tip.checked_sub(stride) else {
                break;
            };
            if height < self.first_height {
                break;
            }
            if let Some(header) = self.header_at(height) {
                locator.push(header.pow_hash());
            }
            let Some(next) = stride.checked_mul(10) else {
                break;
            };
            stride = next;
        }
        if self.first_height < tip {
            if let Some(first) = self.headers.front() {
                let first_hash = first.pow_hash();
                if !locator.contains(&first_hash) {
                    locator.push(first_hash);
                }
            }
        }
        locator
    }

    /// The highest accepted header.
    pub fn tip(&self) -> &Header {
        self.headers.back().expect("chain never empty")
    }

    /// Height of the tip.
    pub fn tip_height(&self) -> u32 {
        self.first_height + self.headers.len() as u32 - 1
    }

    /// Cached hash of the tip.
    pub fn tip_hash(&self) -> Hash {
        self.tip_hash
    }

    /// Copyable tip snapshot.
    pub fn tip_info(&self) -> TipInfo {
        TipInfo {
            height: self.tip_height(),
            hash: self.tip_hash,
            name_root: self.tip().name_root,
        }
    }

    /// Name-tree root at the tip.
    pub fn name_root_at_tip(&self) -> Hash {
        self.tip().name_root
    }

    /// Highest height any handshaken peer has announced.
    pub fn known_network_height(&self) -> Option<u32> {
        self.known_network_height
    }

    /// Height of the oldest header still in memory.
    pub fn first_in_memory_height(&self) -> u32 {
        self.first_height
    }

    /// Number of headers held in memory.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// A chain always has at least its checkpoint window.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Header at an absolute height, if still in memory.
    pub fn header_at(&self, height: u32) -> Option<&Header> {
        let index = height.checked_sub(self.first_height)? as usize;
        self.headers.get(index)
    }

    /// In-memory window in height order, for persistence.
    pub fn window(&self) -> impl Iterator<Item = &Header> {
        self.headers.iter()
    }

    fn trim_excess(&mut self) {
        while self.headers.len() > self.max_in_memory {
            self.headers.pop_front();
            self.first_height += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a linked chain of `n` headers on top of `prev`.
    pub(crate) fn linked_headers(mut prev: Hash, n: usize) -> Vec<Header> {
        let mut out = Vec::with_capacity(n);
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

    fn test_chain(n: usize) -> HeaderChain {
        let headers = linked_headers([0u8; 32], n);
        HeaderChain::from_stored(headers, 1000, 5000, false).unwrap()
    }

    #[test]
    fn test_append_linked() {
        let mut chain = test_chain(3);
        let next = linked_headers(chain.tip_hash(), 1).remove(0);
        chain.append(next).unwrap();
        assert_eq!(chain.tip_height(), 1003);
    }

    #[test]
    fn test_append_link_mismatch() {
        let mut chain = test_chain(3);
        let mut next = linked_headers(chain.tip_hash(), 1).remove(0);
        next.prev_block = [9u8; 32];
        let before = chain.tip_height();
        assert!(matches!(
            chain.append(next),
            Err(ChainError::LinkMismatch { .. })
        ));
        assert_eq!(chain.tip_height(), before);
    }

    #[test]
    fn test_append_zero_prev_rejected() {
        let mut chain = test_chain(3);
        let mut next = linked_headers(chain.tip_hash(), 1).remove(0);
        next.prev_block = [0u8; 32];
        assert!(matches!(
            chain.append(next),
            Err(ChainError::LinkMismatch { .. })
        ));
    }

    #[test]
    fn test_append_overshoot() {
        let mut chain = test_chain(3);
        chain.observe_network_height(1002);
        let next = linked_headers(chain.tip_hash(), 1).remove(0);
        assert!(matches!(
            chain.append(next),
            Err(ChainError::Overshoot { .. })
        ));
    }

    #[test]
    fn test_network_height_only_raises() {
        let mut chain = test_chain(1);
        chain.observe_network_height(5000);
        chain.observe_network_height(4000);
        assert_eq!(chain.known_network_height(), Some(5000));
    }

    #[test]
    fn test_trim_keeps_tip_height() {
        let headers = linked_headers([0u8; 32], 10);
        let mut chain = HeaderChain::from_stored(headers, 0, 4, false).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.tip_height(), 9);
        assert_eq!(chain.first_in_memory_height(), 6);

        let next = linked_headers(chain.tip_hash(), 1).remove(0);
        chain.append(next).unwrap();
        assert_eq!(chain.len(), 4);
        assert_eq!(chain.tip_height(), 10);
        assert_eq!(chain.first_in_memory_height(), 7);
    }

    #[test]
    fn test_window_invariant() {
        let chain = test_chain(7);
        assert_eq!(
            chain.first_in_memory_height() + chain.len() as u32 - 1,
            chain.tip_height()
        );
    }

    #[test]
    fn test_locator_shape() {
        let chain = test_chain(2000);
        let locator = chain.locator();
        assert_eq!(locator[0], chain.tip_hash());
        assert_eq!(locator[1], chain.header_at(chain.tip_height() - 10).unwrap().pow_hash());
        assert_eq!(locator[2], chain.header_at(chain.tip_height() - 100).unwrap().pow_hash());
        assert_eq!(locator[3], chain.header_at(chain.tip_height() - 1000).unwrap().pow_hash());
        // closes with the first in-memory header
        assert_eq!(
            *locator.last().unwrap(),
            chain.headers.front().unwrap().pow_hash()
        );
    }

    #[test]
    fn test_cap_to_network_height() {
        let mut chain = test_chain(10);
        chain.observe_network_height(1005);
        let dropped = chain.cap_to_network_height();
        assert_eq!(dropped, 4);
        assert_eq!(chain.tip_height(), 1005);
        assert_eq!(chain.tip_hash(), chain.tip().pow_hash());
    }

    #[test]
    fn test_from_stored_rejects_broken_link() {
        let mut headers = linked_headers([0u8; 32], 5);
        headers[3].prev_block = [7u8; 32];
        assert!(matches!(
            HeaderChain::from_stored(headers, 0, 100, false),
            Err(ChainError::LinkMismatch { .. })
        ));
    }

    #[test]
    fn test_pow_enforcement_gate() {
        // With enforcement on, an impossible target rejects the header.
        let headers = linked_headers([0u8; 32], 2);
        let mut chain = HeaderChain::from_stored(headers, 0, 100, true).unwrap();
        let mut next = linked_headers(chain.tip_hash(), 1).remove(0);
        next.bits = 0x0300_0001; // target 1; no real hash meets it
        assert!(matches!(
            chain.append(next),
            Err(ChainError::PowTarget { .. })
        ));
    }
}
