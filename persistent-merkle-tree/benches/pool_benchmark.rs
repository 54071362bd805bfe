#[macro_use]
extern crate criterion;

use criterion::{BenchmarkId, Criterion};
use persistent_merkle_tree::{NodeId, NodePool};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// A 32-byte chunk carrying `i` (for benchmarking).
fn chunk_from_u64(i: u64) -> [u8; 32] {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&i.to_le_bytes());
    chunk
}

fn prepare_tree(pool: &mut NodePool, count: u64, depth: u8) -> NodeId {
    let leaves: Vec<NodeId> = (0..count)
        .map(|i| {
            pool.create_leaf(&chunk_from_u64(i), false)
                .unwrap()
                .expect("create leaf")
        })
        .collect();
    pool.fill_with_contents(&leaves, depth, true)
        .unwrap()
        .expect("fill")
}

fn bench(c: &mut Criterion) {
    {
        let mut group = c.benchmark_group("fill with contents and hash");
        let inputs = [1_024u64, 16_384, 131_072];
        for input in inputs.iter() {
            group.bench_with_input(BenchmarkId::new("leaves", input), input, |b, &count| {
                b.iter(|| {
                    let mut pool = NodePool::with_capacity(4 * count as u32).expect("init");
                    let root = prepare_tree(&mut pool, count, 20);
                    pool.hash(root).unwrap().expect("hash")
                });
            });
        }
    }

    c.bench_function("set node and rehash", |b| {
        let mut pool = NodePool::with_capacity(1 << 22).expect("init");
        let root = prepare_tree(&mut pool, 65_536, 16);
        pool.hash(root).unwrap().expect("hash");
        let mut rng = StdRng::seed_from_u64(1);
        let leaf = pool
            .create_leaf(&chunk_from_u64(u64::MAX), true)
            .unwrap()
            .expect("create leaf");
        b.iter(|| {
            let index = rng.random_range(0..65_536);
            let new_root = pool
                .set_node_at_depth(root, 16, index, leaf)
                .unwrap()
                .expect("set node");
            pool.ref_node(new_root).expect("ref");
            let hash = pool.hash(new_root).unwrap().expect("hash");
            pool.unref_node(new_root).unwrap().expect("unref");
            hash
        });
    });

    c.bench_function("set nodes batch of 256", |b| {
        let mut pool = NodePool::with_capacity(1 << 22).expect("init");
        let root = prepare_tree(&mut pool, 65_536, 16);
        let leaf = pool
            .create_leaf(&chunk_from_u64(u64::MAX), true)
            .unwrap()
            .expect("create leaf");
        let nodes = vec![leaf; 256];
        let mut rng = StdRng::seed_from_u64(2);
        b.iter(|| {
            let indices: Vec<u64> = (0..256).map(|_| rng.random_range(0..65_536)).collect();
            let new_root = pool
                .set_nodes_at_depth(root, 16, &indices, &nodes)
                .unwrap()
                .expect("set nodes");
            pool.ref_node(new_root).expect("ref");
            pool.unref_node(new_root).unwrap().expect("unref");
        });
    });

    c.bench_function("get nodes at depth", |b| {
        let mut pool = NodePool::with_capacity(1 << 18).expect("init");
        let root = prepare_tree(&mut pool, 65_536, 16);
        b.iter(|| {
            pool.get_nodes_at_depth(root, 16, 1_000, 10_000)
                .unwrap()
                .expect("get nodes")
        });
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench
);
criterion_main!(benches);
