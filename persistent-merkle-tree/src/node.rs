//! Node handles, node variants and the packed state word.

use std::{fmt, num::NonZeroU32};

use crate::hash::NodeHash;

/// Largest reference count a node can carry; the count shares a 32-bit word
/// with the node type in [`NodeState::packed`].
pub const MAX_REF_COUNT: u32 = 0x1FFF_FFFF;

const TYPE_MASK: u32 = 0x6000_0000;

/// Low bits of a raw handle that carry the slot number plus one.
pub(crate) const SLOT_BITS: u32 = 24;
pub(crate) const SLOT_MASK: u32 = (1 << SLOT_BITS) - 1;

/// Opaque handle to a node slot in a [`crate::NodePool`].
///
/// The low 24 bits hold the slot number plus one and the high 8 bits the
/// slot's generation, which moves on every time the slot is freed. A handle
/// kept past the release of its node therefore stops resolving, even once the
/// slot holds a new node. Generations wrap after 256 reuses of one slot.
///
/// The raw value 0 never names a node, so `Option<NodeId>` costs nothing
/// extra.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Wrap a raw handle; `None` for the reserved value 0.
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(NodeId)
    }

    /// The raw handle value.
    pub fn as_raw(self) -> u32 {
        self.0.get()
    }

    /// Slots are bounded by the pool capacity, so `slot + 1` fits in
    /// `SLOT_MASK`.
    pub(crate) fn from_slot(slot: usize, generation: u8) -> Self {
        NodeId(NonZeroU32::MIN.saturating_add(slot as u32) | ((generation as u32) << SLOT_BITS))
    }

    /// Slot number; out of range for raw values with empty slot bits.
    pub(crate) fn slot(self) -> usize {
        (self.0.get() & SLOT_MASK).wrapping_sub(1) as usize
    }

    pub(crate) fn generation(self) -> u8 {
        (self.0.get() >> SLOT_BITS) as u8
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four node variants, with the bit patterns used in the packed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum NodeType {
    /// Canonical all-zero subtree.
    Zero = 0x0000_0000,
    /// 32 bytes of caller data.
    Leaf = 0x2000_0000,
    /// Branch whose hash has not been forced yet.
    BranchLazy = 0x4000_0000,
    /// Branch with a memoized hash.
    BranchComputed = 0x6000_0000,
}

/// Type and live reference count of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeState {
    /// Variant of the node.
    pub node_type: NodeType,
    /// Number of owners currently holding the node.
    pub ref_count: u32,
}

impl NodeState {
    /// Pack into one word: type in bits 29-30, count in bits 0-28.
    pub fn packed(&self) -> u32 {
        self.node_type as u32 | (self.ref_count & MAX_REF_COUNT)
    }

    /// Inverse of [`NodeState::packed`]. Bit 31 is ignored.
    pub fn from_packed(word: u32) -> Self {
        let node_type = match word & TYPE_MASK {
            0x0000_0000 => NodeType::Zero,
            0x2000_0000 => NodeType::Leaf,
            0x4000_0000 => NodeType::BranchLazy,
            _ => NodeType::BranchComputed,
        };
        NodeState {
            node_type,
            ref_count: word & MAX_REF_COUNT,
        }
    }
}

/// Memoization state of a branch hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BranchHash {
    Lazy,
    Computed(NodeHash),
}

/// What a slot holds. Children are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Zero { depth: u8, hash: NodeHash },
    Leaf { hash: NodeHash },
    Branch {
        left: NodeId,
        right: NodeId,
        hash: BranchHash,
    },
}

impl Node {
    pub(crate) fn node_type(&self) -> NodeType {
        match self {
            Node::Zero { .. } => NodeType::Zero,
            Node::Leaf { .. } => NodeType::Leaf,
            Node::Branch {
                hash: BranchHash::Lazy,
                ..
            } => NodeType::BranchLazy,
            Node::Branch {
                hash: BranchHash::Computed(_),
                ..
            } => NodeType::BranchComputed,
        }
    }

    /// The hash if it is already known.
    pub(crate) fn cached_hash(&self) -> Option<NodeHash> {
        match self {
            Node::Zero { hash, .. } | Node::Leaf { hash } => Some(*hash),
            Node::Branch {
                hash: BranchHash::Computed(hash),
                ..
            } => Some(*hash),
            Node::Branch {
                hash: BranchHash::Lazy,
                ..
            } => None,
        }
    }
}
