//! Outbound ports: where headers come from.
//!
//! The sync loop never sees a socket; it talks to a `HeaderSource`. The
//! peer-network crate adapts a live session into one, and tests plug in
//! the mock below.

use async_trait::async_trait;
use shared_types::Hash;

use crate::domain::{ChainError, Header};

/// A peer (or peer pool) that can serve `getheaders`.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Highest height this source has announced in its `version`
    /// handshake, if any.
    async fn network_height(&self) -> Option<u32>;

    /// Request the headers following the locator, up to `stop_hash`
    /// (all-zero meaning "until your tip"), at most 2,000.
    async fn get_headers(
        &self,
        locator: Vec<Hash>,
        stop_hash: Hash,
    ) -> Result<Vec<Header>, ChainError>;

    /// Identifier for log lines.
    fn source_id(&self) -> String;
}

/// In-memory header source for tests: a full chain it serves in slices.
pub struct MockHeaderSource {
    /// Chain this source pretends to hold, oldest first.
    pub headers: Vec<Header>,
    /// Height of `headers[0]`.
    pub base_height: u32,
    /// Simulate transport failure.
    pub should_fail: bool,
    /// Cap on headers per reply.
    pub batch_limit: usize,
}

impl MockHeaderSource {
    /// A source holding `headers` starting at `base_height`.
    pub fn new(headers: Vec<Header>, base_height: u32) -> Self {
        Self {
            headers,
            base_height,
            should_fail: false,
            batch_limit: 2000,
        }
    }

    fn tip_height(&self) -> u32 {
        self.base_height + self.headers.len() as u32 - 1
    }

    fn find(&self, hash: &Hash) -> Option<usize> {
        self.headers.iter().position(|h| h.pow_hash() == *hash)
    }
}

#[async_trait]
impl HeaderSource for MockHeaderSource {
    async fn network_height(&self) -> Option<u32> {
        if self.headers.is_empty() {
            None
        } else {
            Some(self.tip_height())
        }
    }

    async fn get_headers(
        &self,
        locator: Vec<Hash>,
        _stop_hash: Hash,
    ) -> Result<Vec<Header>, ChainError> {
        if self.should_fail {
            return Err(ChainError::Source {
                message: "mock failure".to_string(),
            });
        }
        // First locator hash we recognize wins, exactly like a real peer
        // scanning for the fork point.
        let start = locator
            .iter()
            .find_map(|hash| self.find(hash))
            .map(|i| i + 1)
            .unwrap_or(0);
        let end = (start + self.batch_limit).min(self.headers.len());
        Ok(self.headers.get(start..end).unwrap_or(&[]).to_vec())
    }

    fn source_id(&self) -> String {
        "mock-source".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(prev: Hash, n: usize) -> Vec<Header> {
        let mut prev = prev;
        let mut out = Vec::new();
        for i in 0..n {
            let header = Header {
                nonce: i as u32,
                time: i as u64,
                prev_block: prev,
                name_root: [0; 32],
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

    #[tokio::test]
    async fn test_mock_serves_after_locator() {
        let headers = linked([0u8; 32], 10);
        let source = MockHeaderSource::new(headers.clone(), 100);

        let locator = vec![headers[4].pow_hash()];
        let served = source.get_headers(locator, [0u8; 32]).await.unwrap();
        assert_eq!(served.len(), 5);
        assert_eq!(served[0], headers[5]);
    }

    #[tokio::test]
    async fn test_mock_unknown_locator_serves_from_base() {
        let headers = linked([0u8; 32], 4);
        let source = MockHeaderSource::new(headers.clone(), 100);
        let served = source.get_headers(vec![[9u8; 32]], [0u8; 32]).await.unwrap();
        assert_eq!(served.len(), 4);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mut source = MockHeaderSource::new(linked([0u8; 32], 2), 0);
        source.should_fail = true;
        assert!(source.get_headers(vec![], [0u8; 32]).await.is_err());
    }
}
