//! The parallel name query.
//!
//! Candidates come name-biased from the directory; each batch of
//! `name_query_threads` peers is asked in parallel and the first proof
//! that verifies wins, cancelling the rest of the batch. An
//! authoritative "not found" counts toward a majority; garbage counts
//! against the peer. Exhausting every batch without a verdict fails the
//! query.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinSet;

use shared_types::{short_hash, Hash, NameHash};

use crate::domain::records::decode_records;
use crate::domain::Resource;
use crate::ports::{PeerOutcome, ProofNetwork};
use crate::proof::{verify_proof, ProofEnvelope};

/// Verdict of one name query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryResult {
    /// A proof verified against the tip's name root.
    Success {
        /// The name's records, decoded.
        records: Vec<Resource>,
        /// The peer that served the winning proof.
        peer: SocketAddr,
    },
    /// A majority of responding peers agreed the name is absent.
    NotFound,
    /// No verdict: every batch failed or timed out.
    Failed,
}

enum TaskOutcome {
    Verified(Vec<Resource>),
    NotFound,
    Garbage,
    Unreachable,
}

/// Run one name query against the network.
pub async fn query_name(
    network: Arc<dyn ProofNetwork>,
    name_hash: NameHash,
    root: Hash,
    threads: usize,
) -> QueryResult {
    let candidates = network.candidates(&name_hash).await;
    if candidates.is_empty() {
        tracing::warn!("[hns-03] no candidate peers for {}", short_hash(&name_hash));
        return QueryResult::Failed;
    }

    let mut notfound = 0usize;
    let mut responded = 0usize;

    for batch in candidates.chunks(threads.max(1)) {
        let mut inflight = JoinSet::new();
        for &peer in batch {
            let network = Arc::clone(&network);
            inflight.spawn(async move {
                let outcome = fetch_and_verify(network.as_ref(), peer, name_hash, root).await;
                (peer, outcome)
            });
        }

        while let Some(joined) = inflight.join_next().await {
            let Ok((peer, outcome)) = joined else {
                continue; // aborted sibling
            };
            match outcome {
                TaskOutcome::Verified(records) => {
                    network.report(peer, PeerOutcome::ProofOk).await;
                    inflight.abort_all();
                    tracing::debug!(
                        "[hns-03] {} verified by {} ({} records)",
                        short_hash(&name_hash),
                        peer,
                        records.len()
                    );
                    return QueryResult::Success { records, peer };
                }
                TaskOutcome::NotFound => {
                    notfound += 1;
                    responded += 1;
                    network.report(peer, PeerOutcome::NotFound).await;
                }
                TaskOutcome::Garbage => {
                    responded += 1;
                    network.report(peer, PeerOutcome::Garbage).await;
                }
                TaskOutcome::Unreachable => {
                    network.report(peer, PeerOutcome::Unreachable).await;
                }
            }
        }
    }

    if notfound > 0 && notfound * 2 >= responded {
        QueryResult::NotFound
    } else {
        tracing::warn!(
            "[hns-03] {} exhausted {} candidates without a verdict",
            short_hash(&name_hash),
            candidates.len()
        );
        QueryResult::Failed
    }
}

async fn fetch_and_verify(
    network: &dyn ProofNetwork,
    peer: SocketAddr,
    name_hash: NameHash,
    root: Hash,
) -> TaskOutcome {
    let bytes = match network.fetch_proof(peer, name_hash, root).await {
        Ok(bytes) => bytes,
        Err(_) => return TaskOutcome::Unreachable,
    };
    let envelope = match ProofEnvelope::decode(&bytes) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!("[hns-03] {} sent an undecodable envelope: {}", peer, e);
            return TaskOutcome::Garbage;
        }
    };
    if envelope.is_not_found() {
        return TaskOutcome::NotFound;
    }
    if !verify_proof(&name_hash, &envelope.records, &envelope.nodes, &root) {
        tracing::debug!("[hns-03] {} served a non-verifying proof", peer);
        return TaskOutcome::Garbage;
    }
    match decode_records(&envelope.records) {
        Ok(records) => TaskOutcome::Verified(records),
        Err(e) => {
            tracing::debug!("[hns-03] {} proof verified but records malformed: {}", peer, e);
            TaskOutcome::Garbage
        }
    }
}
