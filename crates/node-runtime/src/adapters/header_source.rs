//! A live peer session as a `HeaderSource`.

use async_trait::async_trait;
use tokio::sync::Mutex;

use hns_01_header_chain::{ChainError, Header, HeaderSource};
use hns_02_peer_network::PeerSession;
use shared_types::Hash;

/// Wraps one READY session for the sync loop. Requests serialize through
/// the inner lock, matching the one-outstanding-request session contract.
pub struct SessionHeaderSource {
    session: Mutex<PeerSession>,
    id: String,
}

impl SessionHeaderSource {
    /// Adapt a handshaken session.
    pub fn new(session: PeerSession) -> Self {
        let id = session.addr().to_string();
        Self {
            session: Mutex::new(session),
            id,
        }
    }

    /// Unwrap, for closing.
    pub fn into_session(self) -> PeerSession {
        self.session.into_inner()
    }
}

#[async_trait]
impl HeaderSource for SessionHeaderSource {
    async fn network_height(&self) -> Option<u32> {
        self.session.lock().await.peer_height()
    }

    async fn get_headers(
        &self,
        locator: Vec<Hash>,
        stop_hash: Hash,
    ) -> Result<Vec<Header>, ChainError> {
        let raw = self
            .session
            .lock()
            .await
            .request_headers(locator, stop_hash)
            .await
            .map_err(|e| ChainError::Source {
                message: e.to_string(),
            })?;
        raw.iter().map(|bytes| Header::decode(bytes)).collect()
    }

    fn source_id(&self) -> String {
        self.id.clone()
    }
}
