use crate::errors::SolverError;
use crate::instance::Instance;
use crate::operations::Solution;
use crate::solvers::{CancelToken, FixedOrderSolver, check_order};

/// One order-level transformation. Each variant is invertible; applying
/// `invert()` after the action restores the original order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrderAction {
    /// Exchange positions `i` and `j`.
    Swap(usize, usize),
    /// Reverse the subsequence `[i..=j]`.
    TwoOpt(usize, usize),
    /// Remove the element at `i` and reinsert it at `j`.
    Insert(usize, usize),
}

impl OrderAction {
    pub fn apply(self, order: &mut Vec<usize>) {
        match self {
            Self::Swap(i, j) => order.swap(i, j),
            Self::TwoOpt(i, j) => order[i..=j].reverse(),
            Self::Insert(i, j) => {
                let element = order.remove(i);
                order.insert(j, element);
            }
        }
    }

    pub fn invert(self) -> OrderAction {
        match self {
            Self::Swap(i, j) => Self::Swap(i, j),
            Self::TwoOpt(i, j) => Self::TwoOpt(i, j),
            Self::Insert(i, j) => Self::Insert(j, i),
        }
    }
}

/// Tour-order improvement around any fixed-order solver: enumerate the
/// combined swap / 2-opt / insert neighborhood, commit the best action
/// that strictly lowers the inner solver's cost, repeat to a local
/// optimum. First-encountered wins on ties.
#[derive(Clone, Copy, Debug)]
pub struct IterativeImprovement<S: FixedOrderSolver> {
    inner: S,
}

impl<S: FixedOrderSolver> IterativeImprovement<S> {
    pub fn new(inner: S) -> Self {
        IterativeImprovement { inner }
    }

    fn neighborhood(length: usize) -> Vec<OrderAction> {
        let mut actions = vec![];
        for i in 1..length - 1 {
            for j in i + 1..length - 1 {
                actions.push(OrderAction::Swap(i, j));
                actions.push(OrderAction::TwoOpt(i, j));
            }
        }
        for i in 1..length - 1 {
            for j in 1..length - 1 {
                if i != j {
                    actions.push(OrderAction::Insert(i, j));
                }
            }
        }

        actions
    }
}

impl<S: FixedOrderSolver> FixedOrderSolver for IterativeImprovement<S> {
    fn solve_order(
        &self,
        instance: &Instance,
        order: &[usize],
        cancel: &CancelToken,
    ) -> Result<Solution, SolverError> {
        check_order(instance, order)?;

        let mut order = order.to_vec();
        let mut best = self.inner.solve_order(instance, &order, cancel)?;
        loop {
            let mut improvement: Option<(f64, OrderAction)> = None;
            for action in Self::neighborhood(order.len()) {
                cancel.check()?;

                action.apply(&mut order);
                let candidate = self.inner.solve_order(instance, &order, cancel)?;
                action.invert().apply(&mut order);

                if candidate.cost < best.cost
                    && improvement.is_none_or(|(cost, _)| candidate.cost < cost)
                {
                    improvement = Some((candidate.cost, action));
                }
            }

            match improvement {
                Some((_, action)) => {
                    action.apply(&mut order);
                    best = self.inner.solve_order(instance, &order, cancel)?;
                }
                None => return Ok(best),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IterativeImprovement, OrderAction};
    use crate::instance::read_geometric;
    use crate::solvers::fixed_order::FixedOrderDp;
    use crate::solvers::{CancelToken, FixedOrderSolver};

    #[test]
    fn actions_invert_themselves() {
        let original = vec![0, 1, 2, 3, 4, 0];
        for action in [
            OrderAction::Swap(1, 3),
            OrderAction::TwoOpt(1, 4),
            OrderAction::Insert(1, 4),
            OrderAction::Insert(4, 2),
        ] {
            let mut order = original.clone();
            action.apply(&mut order);
            action.invert().apply(&mut order);
            assert_eq!(order, original, "{action:?}");
        }
    }

    #[test]
    fn untangles_a_crossed_order() {
        // Four collinear customers given out of order; the driver must
        // recover the straight sweep for a truck-only instance.
        let instance = read_geometric("1\n0\n5\n0 0 d\n1 0 a\n2 0 b\n3 0 c\n4 0 e\n").unwrap();
        let solver = IterativeImprovement::new(FixedOrderDp);
        let solution = solver
            .solve_order(&instance, &[0, 3, 1, 4, 2, 0], &CancelToken::new())
            .unwrap();
        assert!(solution.is_feasible());
        assert!((solution.cost - 8.0).abs() < 1e-9);
    }

    #[test]
    fn never_worse_than_the_inner_solver_alone() {
        let instance = read_geometric("1\n2\n5\n0 0 d\n2 0 a\n2 2 b\n0 2 c\n1 1 e\n").unwrap();
        let order = [0, 3, 1, 4, 2, 0];
        let inner = FixedOrderDp
            .solve_order(&instance, &order, &CancelToken::new())
            .unwrap();
        let improved = IterativeImprovement::new(FixedOrderDp)
            .solve_order(&instance, &order, &CancelToken::new())
            .unwrap();
        assert!(improved.cost <= inner.cost + 1e-9);
        assert!(improved.is_feasible());
    }
}
