use crate::errors::SolverError;
use crate::instance::Instance;
use crate::mip;
use crate::operations::Solution;
use crate::solvers::{CancelToken, Solver};
use crate::table::{OperationTable, build_constraints};

/// Default soft cap on exact-solver instances; the table and model sizes
/// explode well before the 32-location hard cap.
pub const DEFAULT_SOFT_CAP: usize = 25;

/// The exact pipeline: enumerate the operation table, solve the covering
/// MIP, assemble the selected arcs into a tour.
#[derive(Clone, Copy, Debug)]
pub struct ExactSolver {
    /// Drone range as a multiple of the longest single drone leg;
    /// anything at or above 2 is unrestricted.
    pub max_range_factor: f64,
    /// Truck-only customers allowed per operation; negative means
    /// unrestricted.
    pub max_cardinality: isize,
    /// Refuse instances above this size instead of thrashing.
    pub soft_cap: usize,
}

impl Default for ExactSolver {
    fn default() -> Self {
        ExactSolver {
            max_range_factor: f64::INFINITY,
            max_cardinality: -1,
            soft_cap: DEFAULT_SOFT_CAP,
        }
    }
}

impl Solver for ExactSolver {
    fn solve(&self, instance: &Instance, cancel: &CancelToken) -> Result<Solution, SolverError> {
        if instance.n() > self.soft_cap {
            return Err(SolverError::InstanceTooLarge {
                locations: instance.n(),
                limit: self.soft_cap,
            });
        }

        let constraints = build_constraints(instance, self.max_range_factor, self.max_cardinality)?;
        let table = OperationTable::build(instance, &constraints, cancel)?;
        mip::solve(&table, instance, vec![], cancel)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::ExactSolver;
    use crate::errors::SolverError;
    use crate::generator;
    use crate::instance::Restriction;
    use crate::solvers::fixed_order::FixedOrderDp;
    use crate::solvers::initial::{mst_tour, order_cost};
    use crate::solvers::{CancelToken, FixedOrderSolver, Solver};

    #[test]
    fn exact_matches_its_restricted_wrapper() {
        // An unrestricted overlay must not change the optimum.
        let cancel = CancelToken::new();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let instance = generator::uniform(5, 2.0, &mut rng).unwrap();
            let wrapped = instance.restrict(Restriction::default());

            let base = ExactSolver::default().solve(&instance, &cancel).unwrap();
            let restricted = ExactSolver::default().solve(&wrapped, &cancel).unwrap();
            assert!(
                (base.cost - restricted.cost).abs() <= 1e-8,
                "seed {seed}: {} vs {}",
                base.cost,
                restricted.cost
            );
        }
    }

    #[test]
    fn exact_bounds_the_heuristics() {
        let cancel = CancelToken::new();
        for seed in 10..15 {
            let mut rng = StdRng::seed_from_u64(seed);
            let instance = generator::uniform(5, 2.0, &mut rng).unwrap();
            let order = mst_tour(&instance).unwrap();

            let exact = ExactSolver::default().solve(&instance, &cancel).unwrap();
            let dp = FixedOrderDp.solve_order(&instance, &order, &cancel).unwrap();
            assert!(exact.cost <= dp.cost + 1e-6);
            assert!(exact.cost <= order_cost(&instance, &order) + 1e-6);
        }
    }

    #[test]
    fn soft_cap_rejects_large_instances() {
        let mut rng = StdRng::seed_from_u64(1);
        let instance = generator::uniform(12, 2.0, &mut rng).unwrap();
        let solver = ExactSolver {
            soft_cap: 10,
            ..ExactSolver::default()
        };
        assert!(matches!(
            solver.solve(&instance, &CancelToken::new()),
            Err(SolverError::InstanceTooLarge { locations: 13, limit: 10 })
        ));
    }

    #[test]
    fn wide_range_factor_equals_unrestricted() {
        let cancel = CancelToken::new();
        let mut rng = StdRng::seed_from_u64(21);
        let instance = generator::uniform(5, 2.0, &mut rng).unwrap();

        let unrestricted = ExactSolver::default().solve(&instance, &cancel).unwrap();
        let factor_two = ExactSolver {
            max_range_factor: 2.0,
            ..ExactSolver::default()
        }
        .solve(&instance, &cancel)
        .unwrap();
        assert!((unrestricted.cost - factor_two.cost).abs() <= 1e-8);
    }
}
