//! Hash functions the pool consumes.
//!
//! The tree only ever hashes exactly 64 bytes at a time: the concatenation of
//! two child hashes. [`NodeHasher`] captures that, and the chunk helpers
//! expose the same primitive over many consecutive pairs.

use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Length of every node hash.
pub const HASH_LENGTH: usize = 32;

/// Length of one hashing input: two concatenated node hashes.
pub const CHUNK_LENGTH: usize = 2 * HASH_LENGTH;

/// A 32-byte node hash.
pub type NodeHash = [u8; HASH_LENGTH];

/// Fixed hash function used to merge two child hashes into their parent.
pub trait NodeHasher {
    /// Hash one 64-byte block.
    fn digest64(input: &[u8; CHUNK_LENGTH]) -> NodeHash;

    /// `H(left || right)`.
    fn hash_pair(left: &NodeHash, right: &NodeHash) -> NodeHash {
        let mut input = [0u8; CHUNK_LENGTH];
        input[..HASH_LENGTH].copy_from_slice(left);
        input[HASH_LENGTH..].copy_from_slice(right);
        Self::digest64(&input)
    }
}

/// SHA-256, the SSZ hash-tree-root hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl NodeHasher for Sha256Hasher {
    fn digest64(input: &[u8; CHUNK_LENGTH]) -> NodeHash {
        Sha256::digest(input).into()
    }
}

/// Plain Blake3 over the 64-byte block, without domain tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl NodeHasher for Blake3Hasher {
    fn digest64(input: &[u8; CHUNK_LENGTH]) -> NodeHash {
        *blake3::hash(input).as_bytes()
    }
}

/// Hash every 64-byte chunk of `input`, returning the 32-byte digests back to
/// back.
pub fn hash_chunks<H: NodeHasher>(input: &[u8]) -> Result<Vec<u8>> {
    let mut output = vec![0u8; input.len() / 2];
    hash_chunks_into::<H>(input, &mut output)?;
    Ok(output)
}

/// Like [`hash_chunks`] but writes into `output`, which must be exactly half
/// the length of `input`.
pub fn hash_chunks_into<H: NodeHasher>(input: &[u8], output: &mut [u8]) -> Result<()> {
    if input.len() % CHUNK_LENGTH != 0 {
        return Err(Error::InvalidLength {
            expected: input.len().next_multiple_of(CHUNK_LENGTH),
            actual: input.len(),
        });
    }
    if output.len() != input.len() / 2 {
        return Err(Error::InvalidLength {
            expected: input.len() / 2,
            actual: output.len(),
        });
    }
    for (chunk, out) in input
        .chunks_exact(CHUNK_LENGTH)
        .zip(output.chunks_exact_mut(HASH_LENGTH))
    {
        let block: &[u8; CHUNK_LENGTH] = chunk.try_into().map_err(|_| Error::InvalidLength {
            expected: CHUNK_LENGTH,
            actual: chunk.len(),
        })?;
        out.copy_from_slice(&H::digest64(block));
    }
    Ok(())
}

/// Hashes of the canonical all-zero subtrees, indexed by depth.
pub(crate) fn zero_hashes<H: NodeHasher>(max_depth: u8) -> Vec<NodeHash> {
    let mut hashes = Vec::with_capacity(max_depth as usize + 1);
    hashes.push([0u8; HASH_LENGTH]);
    for depth in 1..=max_depth as usize {
        let below = &hashes[depth - 1];
        hashes.push(H::hash_pair(below, below));
    }
    hashes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_per_chunk(input: &[u8]) -> Vec<u8> {
        input
            .chunks(CHUNK_LENGTH)
            .flat_map(|chunk| Sha256::digest(chunk).to_vec())
            .collect()
    }

    #[test]
    fn test_hash_chunks_matches_sha2() {
        for chunks in 1..=16usize {
            for fill in [0u8, 1, 0x7f, 0xff] {
                let input = vec![fill; CHUNK_LENGTH * chunks];
                let output = hash_chunks::<Sha256Hasher>(&input).expect("hash chunks");
                assert_eq!(output, sha256_per_chunk(&input), "{} chunks of {:#x}", chunks, fill);
            }
        }
    }

    #[test]
    fn test_hash_chunks_into_matches_hash_chunks() {
        let input: Vec<u8> = (0..CHUNK_LENGTH * 3).map(|i| i as u8).collect();
        let mut output = vec![0u8; input.len() / 2];
        hash_chunks_into::<Blake3Hasher>(&input, &mut output).expect("hash into");
        assert_eq!(output, hash_chunks::<Blake3Hasher>(&input).expect("hash"));
    }

    #[test]
    fn test_hash_chunks_rejects_partial_chunk() {
        let err = hash_chunks::<Sha256Hasher>(&[0u8; 65]).expect_err("65 bytes");
        assert_eq!(
            err,
            Error::InvalidLength {
                expected: 128,
                actual: 65
            }
        );
    }

    #[test]
    fn test_hash_chunks_into_rejects_wrong_output() {
        let mut output = [0u8; 31];
        assert!(hash_chunks_into::<Sha256Hasher>(&[0u8; 64], &mut output).is_err());
    }

    #[test]
    fn test_zero_hashes_chain() {
        let hashes = zero_hashes::<Sha256Hasher>(3);
        assert_eq!(hashes.len(), 4);
        assert_eq!(hashes[0], [0u8; 32]);
        // Well-known SSZ zero hash of depth 1.
        assert_eq!(
            hex::encode(hashes[1]),
            "f5a5fd42d16a20302798ef6ed309979b43003d2320d9f0e8ea9831a92759fb4b"
        );
        assert_eq!(hashes[3], Sha256Hasher::hash_pair(&hashes[2], &hashes[2]));
    }

    #[test]
    fn test_hashers_differ() {
        let left = [0xAAu8; 32];
        let right = [0xBBu8; 32];
        assert_ne!(
            Sha256Hasher::hash_pair(&left, &right),
            Blake3Hasher::hash_pair(&left, &right)
        );
        assert_ne!(
            Sha256Hasher::hash_pair(&left, &right),
            Sha256Hasher::hash_pair(&right, &left)
        );
    }
}
