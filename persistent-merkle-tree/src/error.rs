//! Error type returned by every pool operation.

use thiserror::Error;

/// Alias for `core::result::Result<T, Error>`.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors from node pool and tree operations.
///
/// Every variant is local and synchronous; a failing call leaves the pool
/// exactly as it found it.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Leaf, hash or chunk input of the wrong size.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required byte length.
        expected: usize,
        /// Supplied byte length.
        actual: usize,
    },
    /// Handle that is out of range, points at a freed slot, or was issued
    /// for a node whose slot has since been reused.
    #[error("invalid node handle {0}")]
    InvalidHandle(u32),
    /// Gindex of zero, or a path that descends past a node without children.
    #[error("gindex out of range: {0}")]
    GindexOutOfRange(String),
    /// Index not below `2^depth`.
    #[error("index {index} out of range for depth {depth}")]
    IndexOutOfRange {
        /// Depth the index was addressed at.
        depth: u8,
        /// Offending index (or end of a requested range).
        index: u128,
    },
    /// Depth greater than [`crate::MAX_DEPTH`].
    #[error("depth {depth} exceeds maximum depth {max}")]
    InvalidDepth {
        /// Requested depth.
        depth: u8,
        /// Deepest supported tree.
        max: u8,
    },
    /// Paired position/node slices of unequal length.
    #[error("length mismatch: {positions} positions but {nodes} nodes")]
    LengthMismatch {
        /// Number of positions supplied.
        positions: usize,
        /// Number of nodes supplied.
        nodes: usize,
    },
    /// More leaves than a subtree of the given depth can hold.
    #[error("too many leaves: {count} do not fit in a tree of depth {depth}")]
    TooManyLeaves {
        /// Number of leaves supplied.
        count: u128,
        /// Depth of the subtree.
        depth: u8,
    },
    /// Lifecycle violation: double init, zero capacity, or use before init.
    #[error("pool init error: {0}")]
    PoolInit(String),
    /// Not enough free slots to complete the operation.
    #[error("pool exhausted: {requested} nodes requested, {available} of {capacity} available")]
    PoolExhausted {
        /// Configured pool capacity.
        capacity: u32,
        /// Free slots at the time of the call.
        available: u32,
        /// Slots the operation needed.
        requested: u32,
    },
    /// Reference count would exceed [`crate::MAX_REF_COUNT`].
    #[error("reference count overflow on node {0}")]
    RefCountOverflow(u32),
    /// `unref` on a node nobody holds.
    #[error("node {0} has no outstanding references")]
    NotReferenced(u32),
}
