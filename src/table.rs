use std::collections::{HashMap, VecDeque};

use crate::bitset::{CoverSet, MAX_LOCATIONS};
use crate::errors::{EPS, SolverError};
use crate::instance::Instance;
use crate::operations::Operation;
use crate::solvers::CancelToken;

/// One row of the operation table. Immutable once inserted; the truck path
/// is recovered by walking `predecessor` indices through the arena.
#[derive(Clone, Debug)]
pub struct Entry {
    pub first: usize,
    pub last: usize,
    pub covered: CoverSet,
    pub fly: Option<usize>,
    pub drive: f64,
    pub fly_cost: f64,
    pub predecessor: Option<usize>,
    repeated: bool,
}

impl Entry {
    pub fn cost(&self) -> f64 {
        self.drive.max(self.fly_cost)
    }

    /// Truck-only customer count: the covered set minus the endpoints and
    /// the fly node.
    fn truck_only_count(&self) -> usize {
        let mut count = self.covered.len() - 1;
        if self.last != self.first {
            count -= 1;
        }
        if self.fly.is_some() {
            count -= 1;
        }

        count
    }
}

/// Insertion-time predicates. Entries failing any active constraint are
/// never stored.
#[derive(Clone, Copy, Debug)]
pub enum Constraint {
    /// With a fly node: the flight must fit in `max_fly`. Without one: a
    /// truck path over `max_fly` whose predecessor was already over it is
    /// rejected, since no later fly augmentation can bring the operation
    /// cost back under the cap.
    MaxFly(f64),
    /// Upper bound on truck-only customers per operation.
    Cardinality(usize),
}

impl Constraint {
    fn allows(&self, candidate: &Entry, predecessor: Option<&Entry>) -> bool {
        match *self {
            Self::MaxFly(max_fly) => {
                if candidate.fly.is_some() {
                    candidate.fly_cost <= max_fly
                } else {
                    candidate.drive <= max_fly
                        || predecessor.is_none_or(|previous| previous.drive <= max_fly)
                }
            }
            Self::Cardinality(limit) => candidate.truck_only_count() <= limit,
        }
    }
}

/// Derive the active constraint list from solver parameters. A range
/// factor of 2 or more cannot cut anything (a launch-visit-rendezvous
/// triangle is at most two maximal legs), so it yields no constraint;
/// a negative cardinality means unrestricted.
pub fn build_constraints(
    instance: &Instance,
    max_range_factor: f64,
    max_cardinality: isize,
) -> Result<Vec<Constraint>, SolverError> {
    if max_range_factor < 0.0 {
        return Err(SolverError::invalid("range factor must be non-negative"));
    }

    let mut constraints = vec![];
    if max_range_factor < 2.0 {
        let max_leg = instance.fly().max_leg(instance.n());
        constraints.push(Constraint::MaxFly(max_range_factor * max_leg));
    }
    if max_cardinality >= 0 {
        constraints.push(Constraint::Cardinality(max_cardinality as usize));
    }

    Ok(constraints)
}

type Key = (CoverSet, Option<usize>);

/// The table of efficient operations: for every `(first, last, covered,
/// fly)` key, the cheapest entry that survived the constraints.
#[derive(Debug)]
pub struct OperationTable {
    n: usize,
    entries: Vec<Entry>,
    index: Vec<Vec<HashMap<Key, usize>>>,
}

impl OperationTable {
    /// Enumerate all efficient operations for `instance`. Phase 1 grows
    /// truck-only paths through a 3-index DP over (first, last, covered);
    /// phase 2 augments each surviving path with every reachable fly node.
    pub fn build(
        instance: &Instance,
        constraints: &[Constraint],
        cancel: &CancelToken,
    ) -> Result<OperationTable, SolverError> {
        let n = instance.n();
        if n > MAX_LOCATIONS {
            return Err(SolverError::InstanceTooLarge {
                locations: n,
                limit: MAX_LOCATIONS,
            });
        }

        let mut table = OperationTable {
            n,
            entries: vec![],
            index: vec![vec![HashMap::new(); n]; n],
        };

        let mut queue = VecDeque::new();
        for i in 0..n {
            let seed = Entry {
                first: i,
                last: i,
                covered: CoverSet::singleton(i),
                fly: None,
                drive: 0.0,
                fly_cost: 0.0,
                predecessor: None,
                repeated: false,
            };
            if let Some(id) = table.store(seed, None, constraints) {
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            cancel.check()?;

            let current = table.entries[id].clone();
            if current.repeated {
                continue;
            }
            // An entry that has arrived back at the depot is complete.
            if instance.is_depot(current.last) && current.covered.len() > 1 {
                continue;
            }

            for next in 0..n {
                if next == current.last {
                    continue;
                }

                let leg = instance.drive().context_free_with_prior(
                    current.last,
                    next,
                    current.drive,
                );
                if !leg.is_finite() {
                    continue;
                }

                let candidate = Entry {
                    first: current.first,
                    last: next,
                    covered: current.covered.insert(next),
                    fly: None,
                    drive: current.drive + leg,
                    fly_cost: 0.0,
                    predecessor: Some(id),
                    repeated: current.covered.contains(next) && next != current.first,
                };
                if let Some(new_id) = table.store(candidate, Some(&current), constraints) {
                    queue.push_back(new_id);
                }
            }
        }

        table.augment_with_fly(instance, constraints, cancel)?;
        table.verify(instance)?;
        Ok(table)
    }

    fn augment_with_fly(
        &mut self,
        instance: &Instance,
        constraints: &[Constraint],
        cancel: &CancelToken,
    ) -> Result<(), SolverError> {
        let base_ids: Vec<usize> = self.live_ids().collect();
        for id in base_ids {
            cancel.check()?;

            let base = self.entries[id].clone();
            debug_assert!(base.fly.is_none());
            for fly in 0..self.n {
                if instance.is_depot(fly) || base.covered.contains(fly) {
                    continue;
                }

                let fly_cost = instance.fly().fly_distance(base.first, base.last, fly);
                if !fly_cost.is_finite() {
                    continue;
                }

                let candidate = Entry {
                    first: base.first,
                    last: base.last,
                    covered: base.covered.insert(fly),
                    fly: Some(fly),
                    drive: base.drive,
                    fly_cost,
                    predecessor: Some(id),
                    repeated: base.repeated,
                };
                self.store(candidate, Some(&base), constraints);
            }
        }

        Ok(())
    }

    /// Store `candidate` unless a cheaper entry already owns its key or a
    /// constraint rejects it. Fly-less entries compete on drive cost alone
    /// (their fly slot is still open); fly entries compete on `max(drive,
    /// fly)`. Returns the arena id when stored.
    fn store(
        &mut self,
        candidate: Entry,
        predecessor: Option<&Entry>,
        constraints: &[Constraint],
    ) -> Option<usize> {
        if !constraints
            .iter()
            .all(|constraint| constraint.allows(&candidate, predecessor))
        {
            return None;
        }

        let key = (candidate.covered, candidate.fly);
        let slot = &mut self.index[candidate.first][candidate.last];
        if let Some(&existing) = slot.get(&key) {
            let incumbent = &self.entries[existing];
            let better = if candidate.fly.is_none() {
                candidate.drive < incumbent.drive
            } else {
                candidate.cost() < incumbent.cost()
            };
            if !better {
                return None;
            }
        }

        let id = self.entries.len();
        self.index[candidate.first][candidate.last].insert(key, id);
        self.entries.push(candidate);
        Some(id)
    }

    /// Cross-check every stored cost against a from-scratch evaluation of
    /// the reconstructed operation; a mutated distance object behind the
    /// table surfaces here instead of as a silently wrong optimum.
    fn verify(&self, instance: &Instance) -> Result<(), SolverError> {
        for id in self.live_ids() {
            let entry = &self.entries[id];
            let recomputed = self.operation(id).cost(instance);
            if (recomputed - entry.cost()).abs() > EPS {
                return Err(SolverError::TableIntegrity {
                    entry: id,
                    stored: entry.cost(),
                    recomputed,
                });
            }
        }

        Ok(())
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn entry(&self, id: usize) -> &Entry {
        &self.entries[id]
    }

    /// Ids of the entries currently owning a key, i.e. not dominated.
    pub fn live_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.index
            .iter()
            .flatten()
            .flat_map(|slot| slot.values().copied())
    }

    /// All efficient entries running from `first` to `last`.
    pub fn get_operations(&self, first: usize, last: usize) -> Vec<&Entry> {
        self.index[first][last]
            .values()
            .map(|&id| &self.entries[id])
            .collect()
    }

    /// Whether any multi-location entry arrives at the depot; without one
    /// the assembled model cannot close a tour.
    pub fn has_depot_arrivals(&self) -> bool {
        (0..self.n).any(|first| {
            self.index[first][0]
                .values()
                .any(|&id| self.entries[id].covered.len() > 1)
        })
    }

    /// Reconstruct the operation behind an entry by walking the
    /// predecessor chain of its truck path.
    pub fn operation(&self, id: usize) -> Operation {
        let entry = &self.entries[id];
        let path_head = match entry.fly {
            Some(_) => &self.entries[entry.predecessor.unwrap()],
            None => entry,
        };

        let mut reversed = vec![];
        let mut current = path_head;
        loop {
            reversed.push(current.last);
            match current.predecessor {
                Some(previous) => current = &self.entries[previous],
                None => break,
            }
        }
        reversed.reverse();

        // First element is the seed (= first); last element is the path end.
        let drive = if reversed.len() >= 2 {
            reversed[1..reversed.len() - 1].to_vec()
        } else {
            vec![]
        };
        Operation::new(entry.first, drive, entry.last, entry.fly)
    }
}
