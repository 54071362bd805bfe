//! Pairing a pool operation's output with the work it did.

use crate::OperationCost;

/// Output of a pool operation together with its [`OperationCost`].
///
/// The cost is reported on failure as well: an operation that walked three
/// nodes before hitting a leaf still counts those visits.
#[must_use]
#[derive(Debug, Eq, PartialEq)]
pub struct CostContext<T> {
    /// What the operation produced.
    pub value: T,
    /// Work done to produce it.
    pub cost: OperationCost,
}

impl<T> CostContext<T> {
    /// Output of the operation, folding its cost into `total`.
    pub fn unwrap_add_cost(self, total: &mut OperationCost) -> T {
        *total += self.cost;
        self.value
    }

    /// Output of the operation, ignoring its cost.
    pub fn unwrap(self) -> T {
        self.value
    }
}

/// Fallible pool operation output with its cost.
pub type CostResult<T, E> = CostContext<Result<T, E>>;

/// Attach a cost to any value.
pub trait CostsExt: Sized {
    /// Pair `self` with a cost known up front.
    fn wrap_with_cost(self, cost: OperationCost) -> CostContext<Self> {
        CostContext { value: self, cost }
    }

    /// Pair `self` with a cost derived from it, e.g. nodes allocated only when
    /// the operation succeeded.
    fn wrap_fn_cost(self, f: impl FnOnce(&Self) -> OperationCost) -> CostContext<Self> {
        let cost = f(&self);
        CostContext { value: self, cost }
    }
}

impl<T> CostsExt for T {}
