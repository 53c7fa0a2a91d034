use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::SolverError;
use crate::instance::Instance;
use crate::operations::Solution;

pub mod exact;
pub mod fixed_order;
pub mod greedy;
pub mod initial;
pub mod iterative;
pub mod murray_chu;

/// Cooperative cancellation. Solvers poll the token between expansion
/// layers, DP rows and heap pops; a cancelled solve returns
/// [`SolverError::Cancelled`] after releasing its resources.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), SolverError> {
        if self.is_cancelled() {
            Err(SolverError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A complete solver: instance in, feasible solution (or typed error) out.
pub trait Solver {
    fn solve(&self, instance: &Instance, cancel: &CancelToken) -> Result<Solution, SolverError>;
}

/// A solver that assigns truck/drone roles along a given customer order.
/// The order must be a permutation of all locations, depot first and last.
pub trait FixedOrderSolver {
    fn solve_order(
        &self,
        instance: &Instance,
        order: &[usize],
        cancel: &CancelToken,
    ) -> Result<Solution, SolverError>;
}

/// Reject orders that are not depot-to-depot permutations. Shared by every
/// fixed-order solver.
pub(crate) fn check_order(instance: &Instance, order: &[usize]) -> Result<(), SolverError> {
    if order.len() != instance.n() + 1 {
        return Err(SolverError::invalid(format!(
            "order has {} positions, expected {}",
            order.len(),
            instance.n() + 1
        )));
    }
    if order.first() != Some(&instance.depot()) || order.last() != Some(&instance.depot()) {
        return Err(SolverError::invalid("order must start and end at the depot"));
    }

    let mut seen = vec![false; instance.n()];
    for &location in &order[..order.len() - 1] {
        if location >= instance.n() {
            return Err(SolverError::invalid(format!("location {location} out of range")));
        }
        if seen[location] {
            return Err(SolverError::NonAtomicInput(location));
        }

        seen[location] = true;
    }

    Ok(())
}
