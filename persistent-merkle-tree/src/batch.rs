//! Multi-path copy-on-write updates.
//!
//! A batch is applied in two passes. Planning walks the tree once, splitting
//! the updates by path bit at every level, and records which positions need
//! a new branch. Nothing is allocated while planning, so every validation
//! error surfaces before the pool changes. Materializing then allocates
//! exactly the planned branches, bottom-up.

use persistent_merkle_tree_costs::{
    CostResult, CostsExt, OperationCost, cost_return_on_error_default,
    cost_return_on_error_no_add,
};
use tracing::trace;

use crate::{Error, NodePool, Position, Result, hash::NodeHasher, node::NodeId, pool::Arena};

#[derive(Debug, Clone, Copy)]
struct Update {
    position: Position,
    node: NodeId,
}

/// Shape of the updated tree.
#[derive(Debug)]
enum Rebuild {
    /// Reuse an existing node by reference.
    Keep(NodeId),
    /// Allocate a branch over the two rebuilt children.
    Branch(Box<Rebuild>, Box<Rebuild>),
}

impl<H: NodeHasher> NodePool<H> {
    /// Replace the nodes at `gindices` with `new_nodes` in one pass.
    ///
    /// The result is the tree obtained by calling [`NodePool::set_node`] for
    /// each pair in input order: a repeated gindex keeps its last node, and
    /// an update at an ancestor position overrides earlier updates below it.
    /// Every shared ancestor is rebuilt once.
    pub fn set_nodes(
        &mut self,
        root: NodeId,
        gindices: &[u64],
        new_nodes: &[NodeId],
    ) -> CostResult<NodeId, Error> {
        let updates = cost_return_on_error_default!(pair_updates(
            gindices,
            new_nodes,
            Position::from_gindex
        ));
        self.apply_updates(root, &updates)
    }

    /// Replace the nodes at `indices` of `depth` with `new_nodes` in one
    /// pass. Same ordering rules as [`NodePool::set_nodes`].
    pub fn set_nodes_at_depth(
        &mut self,
        root: NodeId,
        depth: u8,
        indices: &[u64],
        new_nodes: &[NodeId],
    ) -> CostResult<NodeId, Error> {
        let updates = cost_return_on_error_default!(pair_updates(indices, new_nodes, |index| {
            Position::at_depth(depth, index)
        }));
        self.apply_updates(root, &updates)
    }

    fn apply_updates(&mut self, root: NodeId, updates: &[Update]) -> CostResult<NodeId, Error> {
        let mut cost = OperationCost::default();
        let arena = cost_return_on_error_no_add!(&cost, self.arena_mut());
        cost_return_on_error_no_add!(&cost, arena.validate(root));
        for update in updates {
            cost_return_on_error_no_add!(&cost, arena.validate(update.node));
        }
        if updates.is_empty() {
            return Ok(root).wrap_with_cost(cost);
        }

        let mut branches = 0;
        let rebuild = cost_return_on_error_no_add!(
            &cost,
            plan(arena, root, 0, updates, &mut branches, &mut cost)
        );
        cost_return_on_error_no_add!(&cost, arena.reserve(branches));
        trace!(updates = updates.len(), branches, "applying batched update");

        let new_root = cost_return_on_error_no_add!(&cost, materialize(arena, rebuild));
        cost.nodes_allocated += branches;
        Ok(new_root).wrap_with_cost(cost)
    }
}

fn pair_updates(
    keys: &[u64],
    nodes: &[NodeId],
    position: impl Fn(u64) -> Result<Position>,
) -> Result<Vec<Update>> {
    if keys.len() != nodes.len() {
        return Err(Error::LengthMismatch {
            positions: keys.len(),
            nodes: nodes.len(),
        });
    }
    keys.iter()
        .zip(nodes)
        .map(|(&key, &node)| {
            Ok(Update {
                position: position(key)?,
                node,
            })
        })
        .collect()
}

/// Plan the rebuild of the subtree `base` at `level`. `updates` all lie at
/// or below this position and are in input order.
fn plan(
    arena: &Arena,
    base: NodeId,
    level: u8,
    updates: &[Update],
    branches: &mut u32,
    cost: &mut OperationCost,
) -> Result<Rebuild> {
    // The last write to this exact position wins over everything before it,
    // including writes further down.
    let (base, pending) = match updates
        .iter()
        .rposition(|update| update.position.depth() == level)
    {
        Some(last) => (updates[last].node, &updates[last + 1..]),
        None => (base, updates),
    };
    let Some(first) = pending.first() else {
        return Ok(Rebuild::Keep(base));
    };

    let (left, right) = arena.children(base)?.ok_or_else(|| {
        Error::GindexOutOfRange(format!(
            "{} descends past a node without children at depth {}",
            first.position, level
        ))
    })?;
    cost.node_visits += 1;

    let (right_updates, left_updates): (Vec<Update>, Vec<Update>) = pending
        .iter()
        .partition(|update| update.position.goes_right(level));
    let new_left = plan(arena, left, level + 1, &left_updates, branches, cost)?;
    let new_right = plan(arena, right, level + 1, &right_updates, branches, cost)?;

    match (&new_left, &new_right) {
        (Rebuild::Keep(l), Rebuild::Keep(r)) if *l == left && *r == right => Ok(Rebuild::Keep(base)),
        _ => {
            *branches += 1;
            Ok(Rebuild::Branch(Box::new(new_left), Box::new(new_right)))
        }
    }
}

fn materialize(arena: &mut Arena, plan: Rebuild) -> Result<NodeId> {
    match plan {
        Rebuild::Keep(id) => Ok(id),
        Rebuild::Branch(left, right) => {
            let left = materialize(arena, *left)?;
            let right = materialize(arena, *right)?;
            arena.branch(left, right, 0)
        }
    }
}
