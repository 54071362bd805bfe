//! Reading and copy-on-write writing of single positions.

use persistent_merkle_tree_costs::{
    CostResult, CostsExt, OperationCost, cost_return_on_error_default,
    cost_return_on_error_no_add,
};

use crate::{
    Error, MAX_DEPTH, NodePool, Position, Result,
    gindex::width,
    hash::NodeHasher,
    node::NodeId,
    pool::Arena,
};

/// Upper bound on the up-front allocation for batched reads.
const PREALLOCATE_LIMIT: u64 = 1 << 16;

impl<H: NodeHasher> NodePool<H> {
    /// Node at `gindex` below `root`.
    pub fn get_node(&self, root: NodeId, gindex: u64) -> CostResult<NodeId, Error> {
        let position = cost_return_on_error_default!(Position::from_gindex(gindex));
        self.get_node_at(root, position)
    }

    /// The `index`-th node at `depth` below `root`.
    pub fn get_node_at_depth(
        &self,
        root: NodeId,
        depth: u8,
        index: u64,
    ) -> CostResult<NodeId, Error> {
        let position = cost_return_on_error_default!(Position::at_depth(depth, index));
        self.get_node_at(root, position)
    }

    /// Node at `position` below `root`.
    pub fn get_node_at(&self, root: NodeId, position: Position) -> CostResult<NodeId, Error> {
        let mut cost = OperationCost::default();
        let arena = cost_return_on_error_no_add!(&cost, self.arena());
        cost_return_on_error_no_add!(&cost, arena.validate(root));
        let mut node = root;
        for (level, right) in position.path().enumerate() {
            let (left_child, right_child) = cost_return_on_error_no_add!(
                &cost,
                children_or_out_of_range(arena, node, position, level)
            );
            cost.node_visits += 1;
            node = if right { right_child } else { left_child };
        }
        Ok(node).wrap_with_cost(cost)
    }

    /// `count` consecutive nodes at `depth` starting at `start_index`, in
    /// index order.
    ///
    /// Each ancestor shared by several requested nodes is visited once.
    pub fn get_nodes_at_depth(
        &self,
        root: NodeId,
        depth: u8,
        start_index: u64,
        count: u64,
    ) -> CostResult<Vec<NodeId>, Error> {
        let mut cost = OperationCost::default();
        if depth > MAX_DEPTH {
            return Err(Error::InvalidDepth {
                depth,
                max: MAX_DEPTH,
            })
            .wrap_with_cost(cost);
        }
        let start = start_index as u128;
        let end = start + count as u128;
        if end > width(depth) {
            return Err(Error::IndexOutOfRange { depth, index: end }).wrap_with_cost(cost);
        }
        let arena = cost_return_on_error_no_add!(&cost, self.arena());
        cost_return_on_error_no_add!(&cost, arena.validate(root));
        let mut nodes = Vec::with_capacity(count.min(PREALLOCATE_LIMIT) as usize);
        if count > 0 {
            let range = LeafRange { depth, start, end };
            cost_return_on_error_no_add!(
                &cost,
                range.collect(arena, root, depth, 0, &mut nodes, &mut cost)
            );
        }
        Ok(nodes).wrap_with_cost(cost)
    }

    /// Copy-on-write replacement of the node at `gindex`.
    ///
    /// See [`NodePool::set_node_at`].
    pub fn set_node(
        &mut self,
        root: NodeId,
        gindex: u64,
        new_node: NodeId,
    ) -> CostResult<NodeId, Error> {
        let position = cost_return_on_error_default!(Position::from_gindex(gindex));
        self.set_node_at(root, position, new_node)
    }

    /// Copy-on-write replacement of the `index`-th node at `depth`.
    pub fn set_node_at_depth(
        &mut self,
        root: NodeId,
        depth: u8,
        index: u64,
        new_node: NodeId,
    ) -> CostResult<NodeId, Error> {
        let position = cost_return_on_error_default!(Position::at_depth(depth, index));
        self.set_node_at(root, position, new_node)
    }

    /// Copy-on-write replacement of the node at `position`.
    ///
    /// Returns a new root that shares every subtree off the path with `root`;
    /// `root` itself is untouched. One branch is allocated per level of the
    /// path. The new root carries no reference of its own, so callers that
    /// keep it should [`NodePool::ref_node`] it. Replacing the root position
    /// returns `new_node` as is.
    pub fn set_node_at(
        &mut self,
        root: NodeId,
        position: Position,
        new_node: NodeId,
    ) -> CostResult<NodeId, Error> {
        let mut cost = OperationCost::default();
        let arena = cost_return_on_error_no_add!(&cost, self.arena_mut());
        cost_return_on_error_no_add!(&cost, arena.validate(root));
        cost_return_on_error_no_add!(&cost, arena.validate(new_node));

        let mut siblings = Vec::with_capacity(position.depth() as usize);
        let mut node = root;
        for (level, right) in position.path().enumerate() {
            let (left_child, right_child) = cost_return_on_error_no_add!(
                &cost,
                children_or_out_of_range(arena, node, position, level)
            );
            cost.node_visits += 1;
            if right {
                siblings.push((left_child, true));
                node = right_child;
            } else {
                siblings.push((right_child, false));
                node = left_child;
            }
        }
        cost_return_on_error_no_add!(&cost, arena.reserve(position.depth() as u32));

        let mut rebuilt = new_node;
        for (sibling, went_right) in siblings.into_iter().rev() {
            let (left, right) = if went_right {
                (sibling, rebuilt)
            } else {
                (rebuilt, sibling)
            };
            rebuilt = cost_return_on_error_no_add!(&cost, arena.branch(left, right, 0));
            cost.nodes_allocated += 1;
        }
        Ok(rebuilt).wrap_with_cost(cost)
    }
}

fn children_or_out_of_range(
    arena: &Arena,
    node: NodeId,
    position: Position,
    level: usize,
) -> Result<(NodeId, NodeId)> {
    arena.children(node)?.ok_or_else(|| {
        Error::GindexOutOfRange(format!(
            "{} descends past a node without children at depth {}",
            position, level
        ))
    })
}

/// Half-open range `[start, end)` of indices at `depth`.
struct LeafRange {
    depth: u8,
    start: u128,
    end: u128,
}

impl LeafRange {
    /// Push the nodes of the range under `node`, which sits `remaining`
    /// levels above the range and covers indices from `base`.
    fn collect(
        &self,
        arena: &Arena,
        node: NodeId,
        remaining: u8,
        base: u128,
        out: &mut Vec<NodeId>,
        cost: &mut OperationCost,
    ) -> Result<()> {
        if remaining == 0 {
            out.push(node);
            return Ok(());
        }
        let (left, right) = arena.children(node)?.ok_or_else(|| {
            Error::GindexOutOfRange(format!(
                "depth {} index {} descends past a node without children at depth {}",
                self.depth,
                base,
                self.depth - remaining
            ))
        })?;
        cost.node_visits += 1;
        let mid = base + (1u128 << (remaining - 1));
        if self.start < mid {
            self.collect(arena, left, remaining - 1, base, out, cost)?;
        }
        if self.end > mid {
            self.collect(arena, right, remaining - 1, mid, out, cost)?;
        }
        Ok(())
    }
}
