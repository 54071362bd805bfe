//! Persistent binary Merkle tree node pool.
//!
//! Trees are built from nodes held in a [`NodePool`] and addressed by
//! [`NodeId`] handles. Nodes are immutable once built: updates return a new
//! root that shares every untouched subtree with the old one, so many
//! versions of a tree can live side by side at the cost of their differences.
//! Ownership is tracked with explicit reference counts and branch hashes are
//! computed lazily, on first request, then memoized.
//!
//! # Core types
//!
//! - [`NodePool`]: the arena, with leaf and branch construction, ref counting,
//!   hashing, navigation, batched updates and subtree fills.
//! - [`NodeId`]: handle of a node in a pool.
//! - [`Position`]: a node position, from a gindex or `(depth, index)`.
//! - [`NodeHasher`]: the hash merging two children, [`Sha256Hasher`] by
//!   default.
//!
//! # Example
//!
//! ```
//! use persistent_merkle_tree::NodePool;
//!
//! let mut pool = NodePool::with_capacity(1024).expect("init");
//! let leaf = pool.create_leaf(&[1u8; 32], false).unwrap().expect("leaf");
//! let root = pool.fill_to_depth(leaf, 3, true).unwrap().expect("fill");
//! assert_eq!(pool.get_node_at_depth(root, 3, 5).unwrap().expect("get"), leaf);
//! assert_eq!(pool.live_nodes(), 4);
//!
//! pool.unref_node(root).unwrap().expect("unref");
//! assert_eq!(pool.live_nodes(), 0);
//! ```

#![warn(missing_docs)]

mod batch;
mod config;
mod error;
mod fill;
mod gindex;
/// Hash functions and batched chunk hashing.
pub mod hash;
mod navigation;
mod node;
mod pool;
#[cfg(test)]
mod tests;

pub use config::{DEFAULT_POOL_CAPACITY, PoolConfig};
pub use error::{Error, Result};
pub use gindex::{MAX_DEPTH, Position};
pub use hash::{
    Blake3Hasher, HASH_LENGTH, NodeHash, NodeHasher, Sha256Hasher, hash_chunks, hash_chunks_into,
};
pub use node::{MAX_REF_COUNT, NodeId, NodeState, NodeType};
pub use persistent_merkle_tree_costs::{CostContext, CostResult, CostsExt, OperationCost};
pub use pool::{MAX_POOL_CAPACITY, NodePool};
