//! Header sync flows: cold start, sync to the network tip, reorg
//! rejection, and restart from the saved store.

use std::time::Duration;

use sha2::{Digest, Sha256};
use shared_types::NetworkParams;

use hns_03_name_resolver::dns::wire::{qclass, qtype, rcode, DnsMessage};
use hns_03_name_resolver::Resolution;

use crate::support::{chain_on, spawn_mock_node, test_checkpoint, MockNodeScript};

use super::{engine_with, wait_for};

const ROOT: [u8; 32] = [0xaa; 32];

#[tokio::test]
async fn cold_start_checkpoint_only() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();
    let (blob, _) = test_checkpoint(&params, ROOT);

    let engine = engine_with(dir.path(), &params, &blob, &[], |_| {}).await;

    // 150 headers loaded, tip at checkpoint height + 149
    assert_eq!(engine.tip().height, params.checkpoint_height + 149);
    assert_eq!(engine.tip().name_root, ROOT);

    // no peers: resolution fails closed with SERVFAIL
    let Resolution::Answer(bytes) = engine
        .resolve("example", qtype::A, qclass::IN)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };
    assert_eq!(DnsMessage::decode(&bytes).unwrap().rcode(), rcode::SERVFAIL);

    // the store holds the window under a valid checksum
    let blob_bytes = std::fs::read(dir.path().join("headers.bin")).unwrap();
    let checksum = std::fs::read(dir.path().join("headers.sha256")).unwrap();
    assert_eq!(Sha256::digest(&blob_bytes).as_slice(), checksum.as_slice());
}

#[tokio::test]
async fn sync_from_checkpoint_to_network_tip() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();
    let (blob, checkpoint_headers) = test_checkpoint(&params, ROOT);

    // one full node holding checkpoint + 500 more headers
    let mut full_chain = checkpoint_headers;
    let extra = chain_on(
        full_chain.last().unwrap().pow_hash(),
        500,
        10_000,
        ROOT,
    );
    full_chain.extend(extra);
    let node = spawn_mock_node(
        params.clone(),
        MockNodeScript {
            headers: full_chain,
            base_height: params.checkpoint_height,
            ..Default::default()
        },
    )
    .await;

    let engine = engine_with(dir.path(), &params, &blob, &[node], |_| {}).await;
    engine.start();

    let target = params.checkpoint_height + 149 + 500;
    wait_for("tip to reach the network height", Duration::from_secs(15), || {
        let height = engine.tip().height;
        async move { height == target }
    })
    .await;

    engine.stop().await;

    // the store was saved at the synced tip: a fresh engine resumes there
    let engine = engine_with(dir.path(), &params, &blob, &[], |_| {}).await;
    assert_eq!(engine.tip().height, target);
}

#[tokio::test]
async fn rotated_checkpoint_rebootstraps() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = NetworkParams::for_testing();
    let (blob, _) = test_checkpoint(&params, ROOT);

    // run once and persist at the old checkpoint height
    {
        let engine = engine_with(dir.path(), &params, &blob, &[], |_| {}).await;
        assert_eq!(engine.tip().height, params.checkpoint_height + 149);
    }

    // an upgrade ships a newer checkpoint on a higher height
    params.checkpoint_height += 10_000;
    let (new_blob, _) = test_checkpoint(&params, ROOT);
    let engine = engine_with(dir.path(), &params, &new_blob, &[], |_| {}).await;
    assert_eq!(engine.tip().height, params.checkpoint_height + 149);

    // and the store now carries the new window
    let engine = engine_with(dir.path(), &params, &new_blob, &[], |_| {}).await;
    assert_eq!(engine.tip().height, params.checkpoint_height + 149);
}

#[tokio::test]
async fn reorg_batch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();
    let (blob, _) = test_checkpoint(&params, ROOT);

    // a node on a different chain entirely, announcing a higher tip
    let forked = chain_on([0xee; 32], 400, 50_000, ROOT);
    let node = spawn_mock_node(
        params.clone(),
        MockNodeScript {
            headers: forked,
            base_height: params.checkpoint_height,
            ..Default::default()
        },
    )
    .await;

    let engine = engine_with(dir.path(), &params, &blob, &[node], |_| {}).await;
    let before = engine.tip().height;
    engine.start();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(engine.tip().height, before, "forked batch must not advance the tip");

    engine.stop().await;
}
