//! Construction of balanced subtrees.
//!
//! Every fill counts the branches it is going to build and reserves them up
//! front, so a fill either completes or leaves the pool untouched.

use persistent_merkle_tree_costs::{
    CostResult, CostsExt, OperationCost, cost_return_on_error_default,
    cost_return_on_error_no_add,
};
use tracing::trace;

use crate::{
    Error, MAX_DEPTH, NodePool, Result,
    gindex::width,
    hash::NodeHasher,
    node::NodeId,
    pool::{Arena, zero_id},
};

impl<H: NodeHasher> NodePool<H> {
    /// Tree of `depth` whose every bottom position is `leaf`.
    ///
    /// Each level is a single branch over two references to the level
    /// below, so exactly `depth` branches are allocated.
    pub fn fill_to_depth(
        &mut self,
        leaf: NodeId,
        depth: u8,
        should_ref: bool,
    ) -> CostResult<NodeId, Error> {
        cost_return_on_error_default!(check_depth(depth));
        let arena = cost_return_on_error_default!(self.arena_mut());
        cost_return_on_error_default!(arena.validate(leaf));
        cost_return_on_error_default!(arena.reserve(depth as u32));
        trace!(depth, "filling to depth");

        let mut cost = OperationCost::default();
        let mut node = leaf;
        for _ in 0..depth {
            node = cost_return_on_error_no_add!(&cost, arena.branch(node, node, 0));
            cost.nodes_allocated += 1;
        }
        cost_return_on_error_no_add!(&cost, finish(arena, node, should_ref));
        Ok(node).wrap_with_cost(cost)
    }

    /// Tree of `depth` whose first `length` bottom positions are `leaf` and
    /// the rest zero.
    ///
    /// Fails with [`Error::TooManyLeaves`] when `length` exceeds `2^depth`.
    /// Only the subtrees along the boundary between filled and empty
    /// positions are new; everything else is shared.
    pub fn fill_to_length(
        &mut self,
        leaf: NodeId,
        depth: u8,
        length: u64,
        should_ref: bool,
    ) -> CostResult<NodeId, Error> {
        cost_return_on_error_default!(check_depth(depth));
        if length as u128 > width(depth) {
            return Err(Error::TooManyLeaves {
                count: length as u128,
                depth,
            })
            .wrap_with_cost(OperationCost::default());
        }
        if length as u128 == width(depth) {
            return self.fill_to_depth(leaf, depth, should_ref);
        }
        let arena = cost_return_on_error_default!(self.arena_mut());
        cost_return_on_error_default!(arena.validate(leaf));
        if length == 0 {
            return Ok(zero_id(depth)).wrap_with_cost(OperationCost::default());
        }

        // Walk down the boundary until the filled part covers a whole
        // subtree. `steps` holds the height of each boundary branch and
        // whether the boundary continues to its right.
        let mut steps = Vec::new();
        let mut height = depth;
        let mut remaining = length as u128;
        let mut tallest_full = 0;
        while remaining != width(height) {
            let half = width(height - 1);
            let continues_right = remaining > half;
            if continues_right {
                remaining -= half;
                tallest_full = tallest_full.max(height - 1);
            }
            steps.push((height, continues_right));
            height -= 1;
        }
        tallest_full = tallest_full.max(height);
        let branches = tallest_full as u32 + steps.len() as u32;
        cost_return_on_error_default!(arena.reserve(branches));
        trace!(depth, length, branches, "filling to length");

        let mut cost = OperationCost::default();
        let mut full = Vec::with_capacity(tallest_full as usize + 1);
        full.push(leaf);
        for level in 0..tallest_full as usize {
            let below = full[level];
            full.push(cost_return_on_error_no_add!(&cost, arena.branch(below, below, 0)));
            cost.nodes_allocated += 1;
        }

        let mut edge = full[height as usize];
        for (height, continues_right) in steps.into_iter().rev() {
            let below = height as usize - 1;
            let (left, right) = if continues_right {
                (full[below], edge)
            } else {
                (edge, zero_id(height - 1))
            };
            edge = cost_return_on_error_no_add!(&cost, arena.branch(left, right, 0));
            cost.nodes_allocated += 1;
        }
        cost_return_on_error_no_add!(&cost, finish(arena, edge, should_ref));
        Ok(edge).wrap_with_cost(cost)
    }

    /// Tree of `depth` holding `leaves` at its first bottom positions, in
    /// order, and zero after them.
    ///
    /// Fails with [`Error::TooManyLeaves`] when there are more than `2^depth`
    /// leaves. Adjacent nodes are paired level by level; an unpaired node at
    /// the end of a level is paired with the zero subtree of its height.
    pub fn fill_with_contents(
        &mut self,
        leaves: &[NodeId],
        depth: u8,
        should_ref: bool,
    ) -> CostResult<NodeId, Error> {
        cost_return_on_error_default!(check_depth(depth));
        if leaves.len() as u128 > width(depth) {
            return Err(Error::TooManyLeaves {
                count: leaves.len() as u128,
                depth,
            })
            .wrap_with_cost(OperationCost::default());
        }
        let arena = cost_return_on_error_default!(self.arena_mut());
        for &leaf in leaves {
            cost_return_on_error_default!(arena.validate(leaf));
        }
        if leaves.is_empty() {
            return Ok(zero_id(depth)).wrap_with_cost(OperationCost::default());
        }

        let mut branches = 0u64;
        let mut count = leaves.len() as u64;
        for _ in 0..depth {
            count = count.div_ceil(2);
            branches += count;
        }
        cost_return_on_error_default!(arena.reserve(u32::try_from(branches).unwrap_or(u32::MAX)));
        trace!(depth, leaves = leaves.len(), branches, "filling with contents");

        let mut cost = OperationCost::default();
        let mut level = leaves.to_vec();
        for height in 0..depth {
            let mut above = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                let right = pair.get(1).copied().unwrap_or_else(|| zero_id(height));
                above.push(cost_return_on_error_no_add!(&cost, arena.branch(pair[0], right, 0)));
                cost.nodes_allocated += 1;
            }
            level = above;
        }
        let root = level[0];
        cost_return_on_error_no_add!(&cost, finish(arena, root, should_ref));
        Ok(root).wrap_with_cost(cost)
    }
}

fn check_depth(depth: u8) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::InvalidDepth {
            depth,
            max: MAX_DEPTH,
        });
    }
    Ok(())
}

fn finish(arena: &mut Arena, root: NodeId, should_ref: bool) -> Result<()> {
    if should_ref {
        arena.retain(root)?;
    }
    Ok(())
}
