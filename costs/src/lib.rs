#![deny(missing_docs)]
//! Work counters for node pool operations.
//!
//! Every pool operation returns a [`CostResult`]: its result plus an
//! [`OperationCost`] saying how many nodes it walked, allocated, released and
//! hashed. The `cost_return_on_error*` macros give such functions `?`-style
//! early returns that keep the cost gathered so far.

pub mod context;

use std::ops::{Add, AddAssign};

pub use context::{CostContext, CostResult, CostsExt};

/// Piece of data representing the work a node pool operation performed.
#[derive(Debug, Default, Eq, PartialEq, Clone, Copy)]
pub struct OperationCost {
    /// How many nodes were stepped through while walking a tree.
    pub node_visits: u32,
    /// How many node slots were taken from the pool.
    pub nodes_allocated: u32,
    /// How many node slots were returned to the pool.
    pub nodes_released: u32,
    /// How many times node hashing was done (for merkelized tree).
    pub hash_node_calls: u32,
}

impl OperationCost {
    /// Whether no work was recorded at all.
    pub fn is_nothing(&self) -> bool {
        self == &Self::default()
    }

    /// Cost with only `node_visits` set.
    pub fn with_node_visits(node_visits: u32) -> Self {
        OperationCost {
            node_visits,
            ..Default::default()
        }
    }

    /// Cost with only `nodes_allocated` set.
    pub fn with_nodes_allocated(nodes_allocated: u32) -> Self {
        OperationCost {
            nodes_allocated,
            ..Default::default()
        }
    }

    /// Cost with only `nodes_released` set.
    pub fn with_nodes_released(nodes_released: u32) -> Self {
        OperationCost {
            nodes_released,
            ..Default::default()
        }
    }

    /// Cost with only `hash_node_calls` set.
    pub fn with_hash_node_calls(hash_node_calls: u32) -> Self {
        OperationCost {
            hash_node_calls,
            ..Default::default()
        }
    }

    /// Net change in live nodes caused by the operation.
    pub fn net_nodes(&self) -> i64 {
        self.nodes_allocated as i64 - self.nodes_released as i64
    }
}

impl Add for OperationCost {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        OperationCost {
            node_visits: self.node_visits + rhs.node_visits,
            nodes_allocated: self.nodes_allocated + rhs.nodes_allocated,
            nodes_released: self.nodes_released + rhs.nodes_released,
            hash_node_calls: self.hash_node_calls + rhs.hash_node_calls,
        }
    }
}

impl AddAssign for OperationCost {
    fn add_assign(&mut self, rhs: Self) {
        self.node_visits += rhs.node_visits;
        self.nodes_allocated += rhs.nodes_allocated;
        self.nodes_released += rhs.nodes_released;
        self.hash_node_calls += rhs.hash_node_calls;
    }
}

/// Early return for an operation that calls other cost-reporting operations.
///
/// `cost_return_on_error!(&mut cost, call)` adds the cost of `call` to `cost`
/// and yields the `Ok` value. On `Err` the enclosing function returns the
/// error wrapped with everything accumulated so far, the failed call included.
#[macro_export]
macro_rules! cost_return_on_error {
    ( &mut $cost:ident, $($body:tt)+ ) => {{
        use $crate::CostsExt;
        let outcome = { $($body)+ }.unwrap_add_cost(&mut $cost);
        match outcome {
            Ok(value) => value,
            Err(error) => return Err(error).wrap_with_cost($cost),
        }
    }};
}

/// Early return on a plain `Result` inside an operation that has already
/// done some work. The error is reported with the cost in `cost`, which is
/// left untouched.
#[macro_export]
macro_rules! cost_return_on_error_no_add {
    ( &$cost:ident, $($body:tt)+ ) => {{
        use $crate::CostsExt;
        let outcome = { $($body)+ };
        match outcome {
            Ok(value) => value,
            Err(error) => return Err(error).wrap_with_cost($cost),
        }
    }};
}

/// Early return on a plain `Result` checked before any work was done; the
/// error is reported with an empty cost.
#[macro_export]
macro_rules! cost_return_on_error_default {
    ( $($body:tt)+ ) => {{
        use $crate::CostsExt;
        let outcome = { $($body)+ };
        match outcome {
            Ok(value) => value,
            Err(error) => return Err(error).wrap_with_cost($crate::OperationCost::default()),
        }
    }};
}
