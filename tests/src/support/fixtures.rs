//! Chain fixtures.

use hns_01_header_chain::{Checkpoint, Header};
use shared_types::network::CHECKPOINT_HEADERS;
use shared_types::{Hash, NetworkParams};

/// A linked run of headers on top of `prev`, all carrying `name_root`.
/// Nonces count up from `nonce_base`.
pub fn chain_on(prev: Hash, n: usize, nonce_base: u32, name_root: Hash) -> Vec<Header> {
    let mut prev = prev;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let header = Header {
            nonce: nonce_base + i as u32,
            time: 1_700_000_000 + i as u64,
            prev_block: prev,
            name_root,
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

/// A checkpoint blob valid for `params`, whose headers all carry
/// `name_root`. Returns the blob and the headers for chaining more on
/// top.
pub fn test_checkpoint(params: &NetworkParams, name_root: Hash) -> (Vec<u8>, Vec<Header>) {
    // params.for_testing witnesses: nonces 1..=150
    let headers = chain_on(
        params.checkpoint_prev_hash,
        CHECKPOINT_HEADERS,
        params.checkpoint_first_nonce,
        name_root,
    );
    let blob = Checkpoint {
        height: params.checkpoint_height,
        chainwork: [0x01; 32],
        headers: headers.clone(),
    }
    .to_blob();
    (blob, headers)
}
