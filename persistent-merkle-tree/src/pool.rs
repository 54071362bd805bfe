//! Fixed-capacity, ref-counted arena of tree nodes.

use std::{fmt, marker::PhantomData};

use persistent_merkle_tree_costs::{
    CostResult, CostsExt, OperationCost, cost_return_on_error_default,
    cost_return_on_error_no_add,
};
use tracing::{debug, warn};

use crate::{
    Error, MAX_DEPTH, PoolConfig, Result,
    hash::{HASH_LENGTH, NodeHash, NodeHasher, Sha256Hasher, zero_hashes},
    node::{BranchHash, MAX_REF_COUNT, Node, NodeId, NodeState, SLOT_MASK},
};

/// Slots holding the pinned zero subtrees, one per depth `0..=MAX_DEPTH`.
const ZERO_SLOTS: usize = MAX_DEPTH as usize + 1;

/// Largest capacity a pool accepts: handles keep 24 bits for the slot, and
/// the zero subtrees take the first slots.
pub const MAX_POOL_CAPACITY: u32 = SLOT_MASK - ZERO_SLOTS as u32;

/// Slots handed out before the arena starts recycling; the rest grow on
/// demand up to the capacity.
const INITIAL_SLOTS: usize = 1024;

#[derive(Debug)]
enum Slot {
    Vacant {
        generation: u8,
    },
    Occupied {
        node: Node,
        ref_count: u32,
        generation: u8,
    },
}

impl Slot {
    fn generation(&self) -> u8 {
        match self {
            Slot::Vacant { generation } | Slot::Occupied { generation, .. } => *generation,
        }
    }
}

/// Backing storage of an initialized pool.
///
/// Slot `i` is addressed by handle `i + 1` tagged with the slot's current
/// generation. Slots `0..=MAX_DEPTH` hold the zero subtrees and are never
/// freed; they do not count against `capacity`.
#[derive(Debug)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    capacity: u32,
    live: u32,
}

impl Arena {
    fn new<H: NodeHasher>(capacity: u32) -> Self {
        let mut slots = Vec::with_capacity(ZERO_SLOTS + INITIAL_SLOTS.min(capacity as usize));
        for (depth, hash) in zero_hashes::<H>(MAX_DEPTH).into_iter().enumerate() {
            slots.push(Slot::Occupied {
                node: Node::Zero {
                    depth: depth as u8,
                    hash,
                },
                ref_count: 0,
                generation: 0,
            });
        }
        Arena {
            slots,
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    /// Node and reference count behind `id`.
    pub(crate) fn entry(&self, id: NodeId) -> Result<(&Node, u32)> {
        match self.slots.get(id.slot()) {
            Some(Slot::Occupied {
                node,
                ref_count,
                generation,
            }) if *generation == id.generation() => Ok((node, *ref_count)),
            _ => Err(Error::InvalidHandle(id.as_raw())),
        }
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<(&mut Node, &mut u32)> {
        match self.slots.get_mut(id.slot()) {
            Some(Slot::Occupied {
                node,
                ref_count,
                generation,
            }) if *generation == id.generation() => Ok((node, ref_count)),
            _ => Err(Error::InvalidHandle(id.as_raw())),
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.entry(id).map(|(node, _)| node)
    }

    pub(crate) fn validate(&self, id: NodeId) -> Result<()> {
        self.entry(id).map(|_| ())
    }

    /// Children of `id`, or `None` for nodes at the bottom of a tree.
    pub(crate) fn children(&self, id: NodeId) -> Result<Option<(NodeId, NodeId)>> {
        Ok(match self.node(id)? {
            Node::Branch { left, right, .. } => Some((*left, *right)),
            Node::Zero { depth, .. } if *depth > 0 => {
                let below = zero_id(*depth - 1);
                Some((below, below))
            }
            Node::Zero { .. } | Node::Leaf { .. } => None,
        })
    }

    pub(crate) fn available(&self) -> u32 {
        self.capacity - self.live
    }

    /// Fail with `PoolExhausted` unless `count` more nodes fit.
    pub(crate) fn reserve(&self, count: u32) -> Result<()> {
        if count > self.available() {
            warn!(
                capacity = self.capacity,
                available = self.available(),
                requested = count,
                "node pool exhausted"
            );
            return Err(Error::PoolExhausted {
                capacity: self.capacity,
                available: self.available(),
                requested: count,
            });
        }
        Ok(())
    }

    fn allocate(&mut self, node: Node, ref_count: u32) -> Result<NodeId> {
        self.reserve(1)?;
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot::Vacant { generation: 0 });
                self.slots.len() - 1
            }
        };
        let generation = self.slots[slot].generation();
        self.slots[slot] = Slot::Occupied {
            node,
            ref_count,
            generation,
        };
        self.live += 1;
        Ok(NodeId::from_slot(slot, generation))
    }

    /// Check that `id` is live and can take `extra` more references.
    fn check_retain(&self, id: NodeId, extra: u32) -> Result<()> {
        match self.entry(id)? {
            (Node::Zero { .. }, _) => Ok(()),
            (_, count) if count > MAX_REF_COUNT - extra => {
                Err(Error::RefCountOverflow(id.as_raw()))
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn retain(&mut self, id: NodeId) -> Result<()> {
        self.check_retain(id, 1)?;
        if let (Node::Leaf { .. } | Node::Branch { .. }, ref_count) = self.entry_mut(id)? {
            *ref_count += 1;
        }
        Ok(())
    }

    /// Allocate a lazy branch over two live nodes and take a reference on
    /// each child.
    pub(crate) fn branch(&mut self, left: NodeId, right: NodeId, ref_count: u32) -> Result<NodeId> {
        if left == right {
            self.check_retain(left, 2)?;
        } else {
            self.check_retain(left, 1)?;
            self.check_retain(right, 1)?;
        }
        let id = self.allocate(
            Node::Branch {
                left,
                right,
                hash: BranchHash::Lazy,
            },
            ref_count,
        )?;
        self.retain(left)?;
        self.retain(right)?;
        Ok(id)
    }

    /// Drop one reference; `Ok(true)` when the count reached zero.
    fn decrement(&mut self, id: NodeId) -> Result<bool> {
        match self.entry_mut(id)? {
            (Node::Zero { .. }, _) => Ok(false),
            (_, 0) => Err(Error::NotReferenced(id.as_raw())),
            (_, ref_count) => {
                *ref_count -= 1;
                Ok(*ref_count == 0)
            }
        }
    }

    /// Free `id` and every descendant whose count drops to zero as a result.
    /// Returns the number of slots freed. Each freed slot moves to its next
    /// generation so handles to the old node stop resolving.
    fn release(&mut self, id: NodeId) -> u32 {
        let mut released = 0;
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            let slot = id.slot();
            let generation = id.generation().wrapping_add(1);
            let vacated = std::mem::replace(&mut self.slots[slot], Slot::Vacant { generation });
            self.free.push(slot);
            self.live -= 1;
            released += 1;
            if let Slot::Occupied {
                node: Node::Branch { left, right, .. },
                ..
            } = vacated
            {
                for child in [left, right] {
                    if matches!(self.decrement(child), Ok(true)) {
                        pending.push(child);
                    }
                }
            }
        }
        released
    }

    /// Hash of `root`, computing and memoizing every lazy branch below it.
    fn force_hash<H: NodeHasher>(&mut self, root: NodeId, cost: &mut OperationCost) -> Result<NodeHash> {
        if let Some(hash) = self.node(root)?.cached_hash() {
            return Ok(hash);
        }
        let mut pending = vec![root];
        while let Some(&top) = pending.last() {
            let (left, right) = match self.node(top)? {
                Node::Branch {
                    left,
                    right,
                    hash: BranchHash::Lazy,
                } => (*left, *right),
                _ => {
                    pending.pop();
                    continue;
                }
            };
            let left_hash = self.node(left)?.cached_hash();
            let right_hash = self.node(right)?.cached_hash();
            match (left_hash, right_hash) {
                (Some(left_hash), Some(right_hash)) => {
                    let computed = H::hash_pair(&left_hash, &right_hash);
                    cost.hash_node_calls += 1;
                    if let (Node::Branch { hash, .. }, _) = self.entry_mut(top)? {
                        *hash = BranchHash::Computed(computed);
                    }
                    pending.pop();
                }
                _ => {
                    if right_hash.is_none() {
                        pending.push(right);
                    }
                    if left_hash.is_none() {
                        pending.push(left);
                    }
                }
            }
        }
        self.node(root)?
            .cached_hash()
            .ok_or(Error::InvalidHandle(root.as_raw()))
    }
}

/// Handle of the pinned zero subtree of `depth`.
pub(crate) fn zero_id(depth: u8) -> NodeId {
    NodeId::from_slot(depth as usize, 0)
}

/// Persistent binary Merkle tree node pool.
///
/// All nodes live in one arena and are addressed by [`NodeId`] handles.
/// Ownership is tracked with explicit reference counts: a branch holds one
/// reference on each child, and callers hold references taken with
/// [`NodePool::ref_node`] (or `should_ref` at creation). Children are fixed
/// when a branch is built, so cycles cannot form.
///
/// The pool starts uninitialized; [`NodePool::init`] gives it a capacity and
/// [`NodePool::deinit`] drops every node at once. Handles from before a
/// `deinit` must not be used afterwards.
pub struct NodePool<H = Sha256Hasher> {
    arena: Option<Arena>,
    _hasher: PhantomData<H>,
}

impl NodePool<Sha256Hasher> {
    /// Uninitialized SHA-256 pool.
    pub fn new() -> Self {
        Self::uninitialized()
    }

    /// SHA-256 pool initialized with `capacity` slots.
    pub fn with_capacity(capacity: u32) -> Result<Self> {
        Self::initialized(capacity)
    }

    /// SHA-256 pool initialized from `config`.
    pub fn from_config(config: &PoolConfig) -> Result<Self> {
        Self::initialized(config.capacity)
    }
}

impl<H> Default for NodePool<H> {
    fn default() -> Self {
        NodePool {
            arena: None,
            _hasher: PhantomData,
        }
    }
}

impl<H> fmt::Debug for NodePool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arena {
            Some(arena) => f
                .debug_struct("NodePool")
                .field("capacity", &arena.capacity)
                .field("live", &arena.live)
                .finish(),
            None => f.write_str("NodePool(uninitialized)"),
        }
    }
}

impl<H: NodeHasher> NodePool<H> {
    /// Pool with no storage; call [`NodePool::init`] before use.
    pub fn uninitialized() -> Self {
        Self::default()
    }

    /// Pool initialized with `capacity` slots.
    pub fn initialized(capacity: u32) -> Result<Self> {
        let mut pool = Self::default();
        pool.init(capacity)?;
        Ok(pool)
    }

    /// Allocate storage for up to `capacity` live nodes.
    ///
    /// Fails with [`Error::PoolInit`] if the pool is already initialized or
    /// `capacity` is zero or above [`MAX_POOL_CAPACITY`].
    pub fn init(&mut self, capacity: u32) -> Result<()> {
        if self.arena.is_some() {
            return Err(Error::PoolInit("pool is already initialized".into()));
        }
        if capacity == 0 {
            return Err(Error::PoolInit("capacity must be positive".into()));
        }
        if capacity > MAX_POOL_CAPACITY {
            return Err(Error::PoolInit(format!(
                "capacity {} exceeds the maximum of {}",
                capacity, MAX_POOL_CAPACITY
            )));
        }
        self.arena = Some(Arena::new::<H>(capacity));
        debug!(capacity, "initialized node pool");
        Ok(())
    }

    /// Release all storage. Every outstanding handle becomes invalid.
    pub fn deinit(&mut self) {
        if let Some(arena) = self.arena.take() {
            debug!(capacity = arena.capacity, live = arena.live, "released node pool");
        }
    }

    /// Whether [`NodePool::init`] has been called since the last deinit.
    pub fn is_initialized(&self) -> bool {
        self.arena.is_some()
    }

    /// Configured capacity, 0 when uninitialized.
    pub fn capacity(&self) -> u32 {
        self.arena.as_ref().map_or(0, |arena| arena.capacity)
    }

    /// Number of allocated nodes, not counting zero subtrees.
    pub fn live_nodes(&self) -> u32 {
        self.arena.as_ref().map_or(0, |arena| arena.live)
    }

    /// Free slots left.
    pub fn available(&self) -> u32 {
        self.arena.as_ref().map_or(0, Arena::available)
    }

    pub(crate) fn arena(&self) -> Result<&Arena> {
        self.arena
            .as_ref()
            .ok_or_else(|| Error::PoolInit("pool is not initialized".into()))
    }

    pub(crate) fn arena_mut(&mut self) -> Result<&mut Arena> {
        self.arena
            .as_mut()
            .ok_or_else(|| Error::PoolInit("pool is not initialized".into()))
    }

    /// Handle of the canonical all-zero subtree of `depth`.
    pub fn zero_node(&self, depth: u8) -> Result<NodeId> {
        self.arena()?;
        if depth > MAX_DEPTH {
            return Err(Error::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            });
        }
        Ok(zero_id(depth))
    }

    /// Allocate a leaf holding exactly 32 bytes of `data`.
    ///
    /// With `should_ref` the leaf starts with one reference, otherwise with
    /// none (a parent branch will take one).
    pub fn create_leaf(&mut self, data: &[u8], should_ref: bool) -> CostResult<NodeId, Error> {
        let hash = cost_return_on_error_default!(<NodeHash>::try_from(data).map_err(|_| {
            Error::InvalidLength {
                expected: HASH_LENGTH,
                actual: data.len(),
            }
        }));
        let arena = cost_return_on_error_default!(self.arena_mut());
        arena
            .allocate(Node::Leaf { hash }, should_ref as u32)
            .wrap_fn_cost(allocation_cost)
    }

    /// Allocate a lazy branch over `left` and `right`, taking a reference on
    /// each child.
    pub fn create_branch(
        &mut self,
        left: NodeId,
        right: NodeId,
        should_ref: bool,
    ) -> CostResult<NodeId, Error> {
        let arena = cost_return_on_error_default!(self.arena_mut());
        arena
            .branch(left, right, should_ref as u32)
            .wrap_fn_cost(allocation_cost)
    }

    /// Take a reference on `id`. No-op for zero subtrees.
    pub fn ref_node(&mut self, id: NodeId) -> Result<()> {
        self.arena_mut()?.retain(id)
    }

    /// Drop a reference on `id`, freeing it and cascading to its children
    /// when the count reaches zero.
    ///
    /// Fails without side effects on invalid handles and on nodes that hold
    /// no references. No-op for zero subtrees.
    pub fn unref_node(&mut self, id: NodeId) -> CostResult<(), Error> {
        let cost = OperationCost::default();
        let arena = cost_return_on_error_no_add!(&cost, self.arena_mut());
        let reached_zero = cost_return_on_error_no_add!(&cost, arena.decrement(id));
        if !reached_zero {
            return Ok(()).wrap_with_cost(cost);
        }
        let released = arena.release(id);
        Ok(()).wrap_with_cost(OperationCost::with_nodes_released(released))
    }

    /// Type and reference count of `id`. Zero subtrees report a count of 0.
    pub fn state(&self, id: NodeId) -> Result<NodeState> {
        let (node, ref_count) = self.arena()?.entry(id)?;
        Ok(NodeState {
            node_type: node.node_type(),
            ref_count,
        })
    }

    /// Left child of `id`.
    pub fn left(&self, id: NodeId) -> Result<NodeId> {
        self.child(id, false)
    }

    /// Right child of `id`.
    pub fn right(&self, id: NodeId) -> Result<NodeId> {
        self.child(id, true)
    }

    fn child(&self, id: NodeId, right: bool) -> Result<NodeId> {
        match self.arena()?.children(id)? {
            Some((_, r)) if right => Ok(r),
            Some((l, _)) => Ok(l),
            None => Err(Error::GindexOutOfRange(format!(
                "node {} has no children",
                id
            ))),
        }
    }

    /// Hash of `id`.
    ///
    /// Leaves and zero subtrees answer immediately. Lazy branches are hashed
    /// bottom-up and the result is memoized in every branch computed along
    /// the way, so each branch is hashed at most once in its lifetime.
    pub fn hash(&mut self, id: NodeId) -> CostResult<NodeHash, Error> {
        let mut cost = OperationCost::default();
        let arena = cost_return_on_error_no_add!(&cost, self.arena_mut());
        arena.force_hash::<H>(id, &mut cost).wrap_with_cost(cost)
    }
}

fn allocation_cost(result: &Result<NodeId>) -> OperationCost {
    match result {
        Ok(_) => OperationCost::with_nodes_allocated(1),
        Err(_) => OperationCost::default(),
    }
}
