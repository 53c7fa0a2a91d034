use crate::errors::{EPS, SolverError};
use crate::instance::Instance;
use crate::operations::{Operation, Solution};
use crate::solvers::{CancelToken, FixedOrderSolver, check_order};

/// A tour position. Truck-path membership lives in `prev`/`next`; a node
/// serving as drone customer leaves the truck chain and hangs between its
/// launch and rendezvous nodes through the fly cross-links:
/// `launch.next_fly -> customer`, `customer.next_fly -> rendezvous`, and
/// the `prev_fly` duals in the opposite direction.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Node {
    location: usize,
    prev: Option<usize>,
    next: Option<usize>,
    next_fly: Option<usize>,
    prev_fly: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SearchAction {
    /// Detach `subject` from the truck path and splice it back in
    /// immediately after `target`.
    Truck { subject: usize, target: usize },
    /// Remove `subject` from the truck path and install it as the drone
    /// customer flown between `from` and `to`.
    Drone {
        subject: usize,
        from: usize,
        to: usize,
    },
}

/// Saved link states for one action; applying them back is the undo.
struct Undo {
    saved: Vec<(usize, Node)>,
}

/// Local search over truck-position and drone-insertion moves, after
/// Murray and Chu. Every iteration scans the full neighborhood with
/// do/undo evaluation and commits the best strictly improving action,
/// first-encountered on ties.
#[derive(Clone, Copy, Debug, Default)]
pub struct MurrayChu;

impl FixedOrderSolver for MurrayChu {
    fn solve_order(
        &self,
        instance: &Instance,
        order: &[usize],
        cancel: &CancelToken,
    ) -> Result<Solution, SolverError> {
        check_order(instance, order)?;

        let mut search = LinkedTour::new(instance, order);
        loop {
            cancel.check()?;

            let current = search.total_cost();
            let mut best: Option<(f64, SearchAction)> = None;
            for action in search.legal_actions() {
                let undo = search.do_action(action);
                let delta = search.total_cost() - current;
                search.undo_action(undo);

                if delta < -EPS && best.is_none_or(|(best_delta, _)| delta < best_delta) {
                    best = Some((delta, action));
                }
            }

            match best {
                Some((_, action)) => {
                    search.do_action(action);
                }
                None => break,
            }
        }

        Ok(search.into_solution())
    }
}

struct LinkedTour<'a> {
    instance: &'a Instance,
    nodes: Vec<Node>,
    head: usize,
    tail: usize,
}

impl<'a> LinkedTour<'a> {
    fn new(instance: &'a Instance, order: &[usize]) -> LinkedTour<'a> {
        let mut nodes: Vec<Node> = order
            .iter()
            .map(|&location| Node {
                location,
                prev: None,
                next: None,
                next_fly: None,
                prev_fly: None,
            })
            .collect();
        for i in 0..nodes.len() {
            nodes[i].prev = i.checked_sub(1);
            nodes[i].next = (i + 1 < nodes.len()).then_some(i + 1);
        }

        LinkedTour {
            instance,
            head: 0,
            tail: nodes.len() - 1,
            nodes,
        }
    }

    fn chain(&self) -> Vec<usize> {
        let mut chain = vec![self.head];
        let mut current = self.head;
        while let Some(next) = self.nodes[current].next {
            chain.push(next);
            current = next;
        }

        chain
    }

    fn has_links(&self, node: usize) -> bool {
        self.nodes[node].next_fly.is_some() || self.nodes[node].prev_fly.is_some()
    }

    fn legal_actions(&self) -> Vec<SearchAction> {
        let chain = self.chain();
        let mut actions = vec![];

        for &subject in &chain {
            if subject == self.head || subject == self.tail || self.has_links(subject) {
                continue;
            }

            for &target in &chain {
                if target == subject || target == self.tail {
                    continue;
                }
                // Splicing back after its own predecessor recreates the
                // current tour.
                if self.nodes[subject].prev == Some(target) {
                    continue;
                }

                actions.push(SearchAction::Truck { subject, target });
            }
        }

        for &subject in &chain {
            if subject == self.head || subject == self.tail || self.has_links(subject) {
                continue;
            }

            for (i, &from) in chain.iter().enumerate() {
                if from == subject {
                    continue;
                }

                for &to in &chain[i + 1..] {
                    if to == subject {
                        continue;
                    }
                    if self.drone_action_legal(subject, from, to) {
                        actions.push(SearchAction::Drone { subject, from, to });
                    }
                }
            }
        }

        actions
    }

    /// The flight legality predicate: the launch slot at `from` and the
    /// rendezvous slot at `to` are free, no node walked between them is
    /// part of any flight (`subject` itself may sit there; it moves out),
    /// and no flight already in progress spans past `to` — the first fly
    /// link found after `to` must be a launch, not a rendezvous.
    fn drone_action_legal(&self, subject: usize, from: usize, to: usize) -> bool {
        if self.nodes[from].next_fly.is_some() || self.nodes[to].prev_fly.is_some() {
            return false;
        }

        let mut current = self.nodes[from].next;
        loop {
            let node = match current {
                Some(node) => node,
                None => return false,
            };
            if node == to {
                break;
            }
            if node != subject && self.has_links(node) {
                return false;
            }

            current = self.nodes[node].next;
        }

        let mut current = self.nodes[to].next;
        while let Some(node) = current {
            if self.nodes[node].next_fly.is_some() {
                break;
            }
            if self.nodes[node].prev_fly.is_some() {
                return false;
            }

            current = self.nodes[node].next;
        }

        true
    }

    fn save(&self, undo: &mut Undo, ids: &[usize]) {
        for &id in ids {
            undo.saved.push((id, self.nodes[id].clone()));
        }
    }

    fn do_action(&mut self, action: SearchAction) -> Undo {
        let mut undo = Undo { saved: vec![] };
        match action {
            SearchAction::Truck { subject, target } => {
                let prev = self.nodes[subject].prev.unwrap();
                let next = self.nodes[subject].next.unwrap();
                let after = self.nodes[target].next.unwrap();
                self.save(&mut undo, &[subject, prev, next, target, after]);

                self.nodes[prev].next = Some(next);
                self.nodes[next].prev = Some(prev);

                self.nodes[subject].prev = Some(target);
                self.nodes[subject].next = Some(self.nodes[target].next.unwrap());
                let after = self.nodes[subject].next.unwrap();
                self.nodes[target].next = Some(subject);
                self.nodes[after].prev = Some(subject);
            }
            SearchAction::Drone { subject, from, to } => {
                let prev = self.nodes[subject].prev.unwrap();
                let next = self.nodes[subject].next.unwrap();
                self.save(&mut undo, &[subject, prev, next, from, to]);

                self.nodes[prev].next = Some(next);
                self.nodes[next].prev = Some(prev);
                self.nodes[subject].prev = None;
                self.nodes[subject].next = None;

                self.nodes[from].next_fly = Some(subject);
                self.nodes[subject].prev_fly = Some(from);
                self.nodes[subject].next_fly = Some(to);
                self.nodes[to].prev_fly = Some(subject);
            }
        }

        undo
    }

    fn undo_action(&mut self, undo: Undo) {
        // Restoring in reverse handles ids saved twice.
        for (id, node) in undo.saved.into_iter().rev() {
            self.nodes[id] = node;
        }
    }

    /// Current tour cost: flight segments cost the slower vehicle, truck
    /// stretches between them cost their legs.
    fn total_cost(&self) -> f64 {
        let drive = self.instance.drive();
        let fly = self.instance.fly();

        let mut cost = 0.0;
        let mut current = self.head;
        while let Some(next) = self.nodes[current].next {
            match self.nodes[current].next_fly {
                Some(customer) => {
                    let rendezvous = self.nodes[customer].next_fly.unwrap();
                    let mut truck = 0.0;
                    let mut walker = current;
                    while walker != rendezvous {
                        let step = self.nodes[walker].next.unwrap();
                        truck += drive.context_free(
                            self.nodes[walker].location,
                            self.nodes[step].location,
                        );
                        walker = step;
                    }

                    let flight = fly.fly_distance(
                        self.nodes[current].location,
                        self.nodes[rendezvous].location,
                        self.nodes[customer].location,
                    );
                    cost += truck.max(flight);
                    current = rendezvous;
                }
                None => {
                    cost += drive.context_free(
                        self.nodes[current].location,
                        self.nodes[next].location,
                    );
                    current = next;
                }
            }
        }

        cost
    }

    fn into_solution(self) -> Solution {
        let mut operations = vec![];
        let mut current = self.head;
        while self.nodes[current].next.is_some() {
            match self.nodes[current].next_fly {
                Some(customer) => {
                    let rendezvous = self.nodes[customer].next_fly.unwrap();
                    let mut internal = vec![];
                    let mut walker = self.nodes[current].next.unwrap();
                    while walker != rendezvous {
                        internal.push(self.nodes[walker].location);
                        walker = self.nodes[walker].next.unwrap();
                    }

                    operations.push(Operation::new(
                        self.nodes[current].location,
                        internal,
                        self.nodes[rendezvous].location,
                        Some(self.nodes[customer].location),
                    ));
                    current = rendezvous;
                }
                None => {
                    let next = self.nodes[current].next.unwrap();
                    operations.push(Operation::atomic(
                        self.nodes[current].location,
                        self.nodes[next].location,
                    ));
                    current = next;
                }
            }
        }

        Solution::new(operations, self.instance)
    }
}

#[cfg(test)]
mod tests {
    use super::{LinkedTour, MurrayChu, SearchAction};
    use crate::instance::read_geometric;
    use crate::solvers::{CancelToken, FixedOrderSolver};

    const LINE: &str = "1\n2\n3\n0 0 depot\n-1 0 left\n1 0 right\n";

    #[test]
    fn do_then_undo_restores_the_list() {
        let instance = read_geometric(LINE).unwrap();
        let mut tour = LinkedTour::new(&instance, &[0, 1, 2, 0]);
        let snapshot = tour.nodes.clone();

        for action in tour.legal_actions() {
            let undo = tour.do_action(action);
            tour.undo_action(undo);
            assert_eq!(tour.nodes, snapshot);
        }
    }

    #[test]
    fn drone_legality_blocks_overlapping_flights() {
        let instance = read_geometric("1\n2\n5\n0 0 d\n1 0 a\n2 0 b\n3 0 c\n4 0 e\n").unwrap();
        let mut tour = LinkedTour::new(&instance, &[0, 1, 2, 3, 4, 0]);

        // Install flight 0 -> (2) -> 3 over the chain.
        assert!(tour.drone_action_legal(2, 0, 3));
        tour.do_action(SearchAction::Drone {
            subject: 2,
            from: 0,
            to: 3,
        });

        // Launch slot at 0 is taken, rendezvous slot at 3 is taken.
        assert!(!tour.drone_action_legal(1, 0, 3));
        assert!(!tour.drone_action_legal(1, 0, 4));
        // A node inside the flown segment cannot host a new flight.
        assert!(!tour.drone_action_legal(4, 1, 3));
        // A fully subsequent flight is fine.
        assert!(tour.drone_action_legal(4, 3, 5));
    }

    #[test]
    fn finds_the_line_optimum() {
        let instance = read_geometric(LINE).unwrap();
        let solution = MurrayChu
            .solve_order(&instance, &[0, 1, 2, 0], &CancelToken::new())
            .unwrap();
        assert!(solution.is_feasible());
        assert!((solution.cost - 2.0).abs() < 1e-9);
        assert!(solution.operations.iter().any(|o| o.fly.is_some()));
    }

    #[test]
    fn truck_moves_fix_a_bad_order() {
        // Zero drone speed: only truck moves are usable, and they must
        // untangle 0 -> b -> a -> c -> 0 into the straight sweep.
        let instance = read_geometric("1\n0\n4\n0 0 d\n1 0 a\n2 0 b\n3 0 c\n").unwrap();
        let solution = MurrayChu
            .solve_order(&instance, &[0, 2, 1, 3, 0], &CancelToken::new())
            .unwrap();
        assert!(solution.is_feasible());
        assert!((solution.cost - 6.0).abs() < 1e-9);
        assert!(solution.operations.iter().all(|o| o.fly.is_none()));
    }

    #[test]
    fn respects_no_visit_restrictions() {
        let instance = read_geometric(LINE).unwrap().restrict(crate::instance::Restriction {
            max_fly: f64::INFINITY,
            forbidden: crate::bitset::CoverSet::EMPTY,
            no_visit: crate::bitset::CoverSet::singleton(1),
        });
        let solution = MurrayChu
            .solve_order(&instance, &[0, 1, 2, 0], &CancelToken::new())
            .unwrap();
        assert!(solution.is_feasible());
        for operation in &solution.operations {
            assert_ne!(operation.fly, Some(1));
        }
        assert!((solution.cost - 2.0).abs() < 1e-9);
    }
}
