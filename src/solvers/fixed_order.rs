use crate::errors::SolverError;
use crate::instance::Instance;
use crate::operations::{Operation, Solution};
use crate::solvers::{CancelToken, FixedOrderSolver, check_order};

/// Optimal truck/drone partition of a fixed customer order.
///
/// `f(j)` is the cheapest way to serve the order prefix ending at position
/// `j`; each candidate segment `(i, j)` either keeps the truck on the full
/// subpath or lifts one inner position onto the drone, bridging the truck
/// around it. O(n^3) time, O(n^2) space.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedOrderDp;

impl FixedOrderSolver for FixedOrderDp {
    fn solve_order(
        &self,
        instance: &Instance,
        order: &[usize],
        cancel: &CancelToken,
    ) -> Result<Solution, SolverError> {
        check_order(instance, order)?;

        let positions = order.len();
        let drive = instance.drive();
        let fly = instance.fly();

        // Consecutive legs and their prefix sums along the order.
        let mut leg = vec![0.0; positions];
        for p in 1..positions {
            leg[p] = drive.context_free(order[p - 1], order[p]);
        }
        let mut cumulative = vec![vec![0.0; positions]; positions];
        for i in 0..positions {
            for j in i + 1..positions {
                cumulative[i][j] = cumulative[i][j - 1] + leg[j];
            }
        }

        let mut best = vec![f64::INFINITY; positions];
        let mut back: Vec<Option<(usize, usize)>> = vec![None; positions];
        best[0] = 0.0;
        for j in 1..positions {
            cancel.check()?;

            for i in 0..j {
                if !best[i].is_finite() {
                    continue;
                }

                for k in i..j {
                    let segment = if k == i {
                        cumulative[i][j]
                    } else {
                        let bridge = drive.context_free(order[k - 1], order[k + 1]);
                        let truck = cumulative[i][j] - leg[k] - leg[k + 1] + bridge;
                        let flight = fly.fly_distance(order[i], order[j], order[k]);
                        truck.max(flight)
                    };
                    if !segment.is_finite() {
                        continue;
                    }

                    let candidate = best[i] + segment;
                    if candidate < best[j] {
                        best[j] = candidate;
                        back[j] = Some((i, k));
                    }
                }
            }
        }

        let last = positions - 1;
        if !best[last].is_finite() {
            return Err(SolverError::Infeasible);
        }

        let mut segments = vec![];
        let mut j = last;
        while j > 0 {
            let (i, k) = back[j].unwrap();
            segments.push((i, j, k));
            j = i;
        }
        segments.reverse();

        let operations = segments
            .into_iter()
            .map(|(i, j, k)| {
                let internal: Vec<usize> = (i + 1..j)
                    .filter(|&p| k == i || p != k)
                    .map(|p| order[p])
                    .collect();
                let fly_node = (k != i).then_some(order[k]);
                Operation::new(order[i], internal, order[j], fly_node)
            })
            .collect();

        Ok(Solution::new(operations, instance))
    }
}
