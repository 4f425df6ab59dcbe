//! Hot-path benchmarks: the header hash (runs once per synced header),
//! the codec around it, and the proof fold (runs once per name query).

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hns_01_header_chain::Header;
use hns_03_name_resolver::proof::{compute_leaf, fold_nodes};
use hns_03_name_resolver::{name_hash, Resource};
use hns_tests::support::chain_on;

fn bench_header_codec(c: &mut Criterion) {
    let header = chain_on([0u8; 32], 1, 1, [0xaa; 32]).remove(0);
    let bytes = header.encode();

    c.bench_function("header_encode", |b| {
        b.iter(|| black_box(header.encode()));
    });
    c.bench_function("header_decode", |b| {
        b.iter(|| Header::decode(black_box(&bytes)).unwrap());
    });
}

fn bench_pow_hash(c: &mut Criterion) {
    let header = chain_on([0u8; 32], 1, 1, [0xaa; 32]).remove(0);
    c.bench_function("header_pow_hash", |b| {
        b.iter(|| black_box(&header).pow_hash());
    });
}

fn bench_proof_fold(c: &mut Criterion) {
    let nh = name_hash("welove");
    let record = Resource {
        rtype: 1,
        data: vec![1, 2, 3, 4],
    };
    let entries = vec![record.encode()];
    // a realistic name-tree depth
    let nodes: Vec<[u8; 32]> = (0u8..32).map(|i| [i; 32]).collect();

    c.bench_function("proof_fold_32_nodes", |b| {
        b.iter(|| {
            let leaf = compute_leaf(black_box(&nh), black_box(&entries));
            fold_nodes(leaf, black_box(&nodes))
        });
    });
}

fn bench_batch_append(c: &mut Criterion) {
    use hns_01_header_chain::HeaderChain;
    let headers = chain_on([0u8; 32], 2001, 1, [0xaa; 32]);

    c.bench_function("append_2000_headers", |b| {
        b.iter(|| {
            let mut chain =
                HeaderChain::from_stored(headers[..1].to_vec(), 0, 5000, false).unwrap();
            for header in &headers[1..] {
                chain.append(header.clone()).unwrap();
            }
            black_box(chain.tip_height())
        });
    });
}

criterion_group!(
    benches,
    bench_header_codec,
    bench_pow_hash,
    bench_proof_fold,
    bench_batch_append
);
criterion_main!(benches);
