
use crate::{
    MAX_DEPTH, NodeHash, NodeHasher, NodeId, NodePool, Sha256Hasher, hash::zero_hashes,
};

/// A 32-byte chunk carrying `i` in its first eight bytes.
pub(crate) fn chunk_from_u64(i: u64) -> NodeHash {
    let mut chunk = [0u8; 32];
    chunk[..8].copy_from_slice(&i.to_le_bytes());
    chunk
}

pub(crate) fn new_pool(capacity: u32) -> NodePool {
    NodePool::with_capacity(capacity).expect("init pool")
}

pub(crate) fn leaf_from_u64(pool: &mut NodePool, i: u64) -> NodeId {
    pool.create_leaf(&chunk_from_u64(i), false)
        .unwrap()
        .expect("create leaf")
}

/// Unreferenced leaves carrying `start..start + count`.
pub(crate) fn leaves_from(pool: &mut NodePool, start: u64, count: u64) -> Vec<NodeId> {
    (start..start + count)
        .map(|i| leaf_from_u64(pool, i))
        .collect()
}

pub(crate) fn root_hash(pool: &mut NodePool, root: NodeId) -> NodeHash {
    pool.hash(root).unwrap().expect("hash root")
}

/// Root of `chunks` zero-padded to `2^depth`, computed without a pool.
pub(crate) fn expected_root(chunks: &[NodeHash], depth: u8) -> NodeHash {
    let zeros = zero_hashes::<Sha256Hasher>(MAX_DEPTH);
    let mut level = chunks.to_vec();
    for height in 0..depth as usize {
        level = level
            .chunks(2)
            .map(|pair| Sha256Hasher::hash_pair(&pair[0], pair.get(1).unwrap_or(&zeros[height])))
            .collect();
    }
    level.first().copied().unwrap_or(zeros[depth as usize])
}
