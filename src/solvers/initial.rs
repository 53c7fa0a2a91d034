use rand::Rng;
use rand::seq::SliceRandom;

use crate::dsu::UnionFind;
use crate::errors::SolverError;
use crate::heap::{HeapElement, IndexedMinHeap};
use crate::instance::Instance;

struct Edge {
    a: usize,
    b: usize,
}

impl HeapElement for Edge {
    fn notify_position(&mut self, _position: usize) {}
}

/// Preorder walk of the drive-metric minimum spanning tree, depot first
/// and last. The classic 2-approximate TSP seed.
pub fn mst_tour(instance: &Instance) -> Result<Vec<usize>, SolverError> {
    let n = instance.n();
    let mut heap = IndexedMinHeap::new();
    for a in 0..n {
        for b in a + 1..n {
            let weight = instance.drive().context_free(a, b);
            if weight.is_finite() {
                heap.push(weight, Edge { a, b });
            }
        }
    }

    let mut dsu = UnionFind::new(n);
    let mut adjacency = vec![vec![]; n];
    let mut taken = 0;
    while taken + 1 < n {
        let Some((_, edge)) = heap.pop() else {
            return Err(SolverError::Infeasible);
        };
        if dsu.union(edge.a, edge.b) {
            adjacency[edge.a].push(edge.b);
            adjacency[edge.b].push(edge.a);
            taken += 1;
        }
    }

    for neighbors in &mut adjacency {
        neighbors.sort_unstable();
    }

    let mut order = vec![];
    let mut visited = vec![false; n];
    let mut stack = vec![instance.depot()];
    while let Some(node) = stack.pop() {
        if visited[node] {
            continue;
        }

        visited[node] = true;
        order.push(node);
        for &neighbor in adjacency[node].iter().rev() {
            if !visited[neighbor] {
                stack.push(neighbor);
            }
        }
    }

    order.push(instance.depot());
    Ok(order)
}

/// A uniformly random customer permutation between the depot endpoints.
pub fn random_tour<R: Rng>(instance: &Instance, rng: &mut R) -> Vec<usize> {
    let mut customers: Vec<usize> = (1..instance.n()).collect();
    customers.shuffle(rng);

    let mut order = vec![instance.depot()];
    order.extend(customers);
    order.push(instance.depot());
    order
}

/// Truck-only cost of driving an order as-is; the baseline the seeded
/// heuristics must not exceed.
pub fn order_cost(instance: &Instance, order: &[usize]) -> f64 {
    order
        .windows(2)
        .map(|pair| instance.drive().context_free(pair[0], pair[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{mst_tour, order_cost, random_tour};
    use crate::generator;
    use crate::instance::read_geometric;
    use crate::solvers::fixed_order::FixedOrderDp;
    use crate::solvers::greedy::GreedyFixedOrder;
    use crate::solvers::murray_chu::MurrayChu;
    use crate::solvers::{CancelToken, FixedOrderSolver};

    #[test]
    fn mst_tour_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(11);
        let instance = generator::uniform(12, 2.0, &mut rng).unwrap();
        let order = mst_tour(&instance).unwrap();
        assert_eq!(order.len(), instance.n() + 1);
        assert_eq!(order[0], 0);
        assert_eq!(*order.last().unwrap(), 0);

        let mut sorted = order[..order.len() - 1].to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..instance.n()).collect::<Vec<usize>>());
    }

    #[test]
    fn mst_tour_on_the_line_is_the_sweep() {
        let instance = read_geometric("1\n1\n4\n0 0 d\n1 0 a\n2 0 b\n3 0 c\n").unwrap();
        let order = mst_tour(&instance).unwrap();
        assert_eq!(order, vec![0, 1, 2, 3, 0]);
        assert_eq!(order_cost(&instance, &order), 6.0);
    }

    #[test]
    fn random_tour_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(3);
        let instance = generator::uniform(10, 2.0, &mut rng).unwrap();
        let order = random_tour(&instance, &mut rng);
        let mut sorted = order[1..order.len() - 1].to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..instance.n()).collect::<Vec<usize>>());
    }

    /// Every heuristic seeded with the MST tour must stay at or below the
    /// plain MST tour cost, across 100 random size-20 instances.
    #[test]
    fn mst_seeded_heuristics_are_monotone() {
        let cancel = CancelToken::new();
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let instance = generator::uniform(19, 2.0, &mut rng).unwrap();
            let order = mst_tour(&instance).unwrap();
            let baseline = order_cost(&instance, &order);

            let dp = FixedOrderDp.solve_order(&instance, &order, &cancel).unwrap();
            assert!(dp.is_feasible());
            assert!(dp.cost <= baseline + 1e-9, "dp regressed on seed {seed}");

            let greedy = GreedyFixedOrder::default()
                .solve_order(&instance, &order, &cancel)
                .unwrap();
            assert!(greedy.is_feasible());
            assert!(
                greedy.cost <= baseline + 1e-9,
                "greedy regressed on seed {seed}"
            );

            let murray_chu = MurrayChu.solve_order(&instance, &order, &cancel).unwrap();
            assert!(murray_chu.is_feasible());
            assert!(
                murray_chu.cost <= baseline + 1e-9,
                "murray-chu regressed on seed {seed}"
            );
        }
    }

    /// On random size-20 instances the Murray-Chu search should strictly
    /// improve the MST seed and deploy the drone in the vast majority of
    /// runs.
    #[test]
    fn murray_chu_improves_the_mst_seed() {
        let cancel = CancelToken::new();
        let mut improved = 0;
        let mut with_fly = 0;
        for seed in 100..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let instance = generator::uniform(19, 2.0, &mut rng).unwrap();
            let order = mst_tour(&instance).unwrap();
            let baseline = order_cost(&instance, &order);

            let solution = MurrayChu.solve_order(&instance, &order, &cancel).unwrap();
            if solution.cost < baseline - 1e-9 {
                improved += 1;
            }
            if solution.operations.iter().any(|o| o.fly.is_some()) {
                with_fly += 1;
            }
        }

        assert!(improved >= 80, "only {improved}/100 runs improved");
        assert!(with_fly >= 80, "only {with_fly}/100 runs used the drone");
    }
}
