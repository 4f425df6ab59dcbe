//! Name resolution flows: verified TLD answers, byzantine proofs, and
//! subdomain resolution through glue nameservers.

use std::collections::HashMap;
use std::time::Duration;

use shared_types::NetworkParams;
use tokio::net::UdpSocket;

use hns_03_name_resolver::dns::wire::{qclass, qtype, rcode, DnsMessage, DnsRecord};
use hns_03_name_resolver::proof::{compute_leaf, fold_nodes};
use hns_03_name_resolver::{name_hash, ProofEnvelope, Resolution, Resource};

use crate::support::{spawn_mock_node, test_checkpoint, MockNodeScript};

use super::engine_with;

/// Records plus a root they provably fold to.
fn proven_records(name: &str, records: Vec<Resource>) -> (ProofEnvelope, [u8; 32]) {
    let entries: Vec<Vec<u8>> = records.iter().map(Resource::encode).collect();
    let envelope = ProofEnvelope {
        records: entries.clone(),
        nodes: vec![[0x3c; 32], [0x99; 32]],
    };
    let root = fold_nodes(compute_leaf(&name_hash(name), &entries), &envelope.nodes);
    (envelope, root)
}

fn a_record(octets: [u8; 4]) -> Resource {
    Resource {
        rtype: hns_03_name_resolver::domain::rtype::A,
        data: octets.to_vec(),
    }
}

fn glue_ns(ns: &str, ip: &str) -> Resource {
    let mut data = ns.as_bytes().to_vec();
    data.push(0);
    data.extend_from_slice(ip.as_bytes());
    Resource {
        rtype: hns_03_name_resolver::domain::rtype::NS,
        data,
    }
}

async fn node_serving(params: &NetworkParams, name: &str, envelope: Vec<u8>) -> std::net::SocketAddr {
    let mut proofs = HashMap::new();
    proofs.insert(name_hash(name), envelope);
    spawn_mock_node(
        params.clone(),
        MockNodeScript {
            proofs,
            announce_height: Some(200_000),
            ..Default::default()
        },
    )
    .await
}

#[tokio::test]
async fn name_resolution_happy_path() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();

    let (envelope, root) = proven_records("welove", vec![a_record([1, 2, 3, 4])]);
    let (blob, _) = test_checkpoint(&params, root);

    // three honest peers (one speaking CBOR), one serving garbage
    let honest1 = node_serving(&params, "welove", envelope.encode_binary()).await;
    let honest2 = node_serving(&params, "welove", envelope.encode_cbor()).await;
    let honest3 = node_serving(&params, "welove", envelope.encode_binary()).await;
    let garbage = node_serving(&params, "welove", b"complete nonsense".to_vec()).await;

    let engine = engine_with(
        dir.path(),
        &params,
        &blob,
        &[honest1, honest2, honest3, garbage],
        |_| {},
    )
    .await;

    let Resolution::Answer(bytes) = engine
        .resolve("welove", qtype::A, qclass::IN)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };
    let message = DnsMessage::decode(&bytes).unwrap();
    assert_eq!(message.rcode(), rcode::NOERROR);
    assert_eq!(message.answers.len(), 1);
    assert_eq!(message.answers[0].rdata, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn byzantine_proof_is_servfail() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();

    // the chain commits to the honest records; the only peer swaps in
    // its own address, so the proof can no longer fold to the root
    let (_, root) = proven_records("welove", vec![a_record([1, 2, 3, 4])]);
    let (forged, _) = proven_records("welove", vec![a_record([9, 9, 9, 9])]);
    let (blob, _) = test_checkpoint(&params, root);

    let byzantine = node_serving(&params, "welove", forged.encode_binary()).await;
    let engine = engine_with(dir.path(), &params, &blob, &[byzantine], |_| {}).await;

    let Resolution::Answer(bytes) = engine
        .resolve("welove", qtype::A, qclass::IN)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };
    assert_eq!(DnsMessage::decode(&bytes).unwrap().rcode(), rcode::SERVFAIL);
}

#[tokio::test]
async fn absent_tld_goes_upstream() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();

    let (_, root) = proven_records("claimed", vec![a_record([1, 1, 1, 1])]);
    let (blob, _) = test_checkpoint(&params, root);

    // peer has no entry for "com": serves authoritative not-found
    let node = node_serving(&params, "claimed", ProofEnvelope::not_found().encode_binary()).await;
    let engine = engine_with(dir.path(), &params, &blob, &[node], |_| {}).await;

    let resolution = engine.resolve("com", qtype::A, qclass::IN).await.unwrap();
    assert_eq!(resolution, Resolution::NotHandshake);
}

#[tokio::test]
async fn subdomain_via_glue() {
    let dir = tempfile::tempdir().unwrap();
    let params = NetworkParams::for_testing();

    // the zone's authoritative server, scripted on loopback UDP
    let zone = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let glue_port = zone.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut buf = vec![0u8; 512];
        loop {
            let (n, from) = zone.recv_from(&mut buf).await.unwrap();
            let query = DnsMessage::decode(&buf[..n]).unwrap();
            assert_eq!(query.questions[0].name, "shop.mytld");
            let mut reply =
                DnsMessage::response(query.id, query.questions[0].clone(), rcode::NOERROR);
            reply.answers.push(DnsRecord {
                name: query.questions[0].name.clone(),
                rtype: qtype::A,
                class: qclass::IN,
                ttl: 60,
                rdata: vec![198, 51, 100, 9],
            });
            zone.send_to(&reply.encode(), from).await.unwrap();
        }
    });

    let (envelope, root) =
        proven_records("mytld", vec![glue_ns("ns1.mytld", "127.0.0.1")]);
    let (blob, _) = test_checkpoint(&params, root);
    let node = node_serving(&params, "mytld", envelope.encode_binary()).await;

    let engine = engine_with(dir.path(), &params, &blob, &[node], |config| {
        config.resolver.glue_port = glue_port;
    })
    .await;

    let Resolution::Answer(bytes) = engine
        .resolve("shop.mytld", qtype::A, qclass::IN)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };
    let message = DnsMessage::decode(&bytes).unwrap();
    assert_eq!(message.rcode(), rcode::NOERROR);
    assert_eq!(message.answers[0].rdata, vec![198, 51, 100, 9]);

    // cached: a second resolve answers without consulting the zone again
    let started = std::time::Instant::now();
    let Resolution::Answer(cached) = engine
        .resolve("shop.mytld", qtype::A, qclass::IN)
        .await
        .unwrap()
    else {
        panic!("expected an answer");
    };
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(
        DnsMessage::decode(&cached).unwrap().answers[0].rdata,
        vec![198, 51, 100, 9]
    );
}
