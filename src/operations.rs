use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bitset::CoverSet;
use crate::errors::{EPS, SolverError};
use crate::instance::{Instance, strip_comments};

/// One joint truck-drone movement: the truck drives `start -> drive... ->
/// end` while the drone, when `fly` is set, launches at `start`, serves the
/// fly customer and rejoins at `end`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Operation {
    pub start: usize,
    pub drive: Vec<usize>,
    pub end: usize,
    pub fly: Option<usize>,
}

impl Operation {
    pub fn new(start: usize, drive: Vec<usize>, end: usize, fly: Option<usize>) -> Operation {
        debug_assert!(fly.is_none_or(|f| !drive.contains(&f)));
        Operation {
            start,
            drive,
            end,
            fly,
        }
    }

    pub fn atomic(start: usize, end: usize) -> Operation {
        Self::new(start, vec![], end, None)
    }

    pub fn drive_cost(&self, instance: &Instance) -> f64 {
        instance.drive().path_distance(self.start, self.end, &self.drive)
    }

    pub fn fly_cost(&self, instance: &Instance) -> f64 {
        match self.fly {
            Some(fly) => instance.fly().fly_distance(self.start, self.end, fly),
            None => 0.0,
        }
    }

    /// The slower vehicle determines the operation's duration.
    pub fn cost(&self, instance: &Instance) -> f64 {
        self.drive_cost(instance).max(self.fly_cost(instance))
    }

    /// Every location index this operation touches.
    pub fn covered(&self) -> CoverSet {
        let mut covered = CoverSet::singleton(self.start).insert(self.end);
        for &node in &self.drive {
            covered = covered.insert(node);
        }
        if let Some(fly) = self.fly {
            covered = covered.insert(fly);
        }

        covered
    }

    pub fn is_valid(&self) -> bool {
        match self.fly {
            Some(fly) => !self.drive.contains(&fly) && fly != self.start && fly != self.end,
            None => true,
        }
    }
}

/// An immutable tour: a chain of operations starting and ending at the
/// depot, with the derived scalars evaluated once at construction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Solution {
    pub operations: Vec<Operation>,

    pub cost: f64,
    pub truck_cost: f64,
    pub drone_cost: f64,
    pub truck_waiting: f64,
    pub drone_waiting: f64,
    pub max_operation_cost: f64,

    pub feasible: bool,
}

impl Solution {
    pub fn new(operations: Vec<Operation>, instance: &Instance) -> Solution {
        let mut cost = 0.0;
        let mut truck_cost = 0.0;
        let mut drone_cost = 0.0;
        let mut truck_waiting = 0.0;
        let mut drone_waiting = 0.0;
        let mut max_operation_cost = 0.0_f64;
        for operation in &operations {
            let drive = operation.drive_cost(instance);
            let fly = operation.fly_cost(instance);
            let total = drive.max(fly);

            cost += total;
            truck_cost += drive;
            truck_waiting += total - drive;
            if operation.fly.is_some() {
                drone_cost += fly;
                drone_waiting += total - fly;
            }
            max_operation_cost = max_operation_cost.max(total);
        }

        let feasible = Self::check_feasible(&operations, instance) && cost.is_finite();

        Solution {
            operations,
            cost,
            truck_cost,
            drone_cost,
            truck_waiting,
            drone_waiting,
            max_operation_cost,
            feasible,
        }
    }

    fn check_feasible(operations: &[Operation], instance: &Instance) -> bool {
        let Some(first) = operations.first() else {
            return false;
        };
        let last = operations.last().unwrap();
        if first.start != instance.depot() || last.end != instance.depot() {
            return false;
        }

        let mut covered = CoverSet::EMPTY;
        for pair in operations.windows(2) {
            if pair[0].end != pair[1].start {
                return false;
            }
        }
        for operation in operations {
            if !operation.is_valid() {
                return false;
            }

            covered = covered.union(operation.covered());
        }

        covered == CoverSet::full(instance.n())
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible
    }

    /// Drop redundant revisits: inner truck-path duplicates of
    /// already-covered locations are deleted (path endpoints stay pinned),
    /// and an already-covered fly node is dropped by splitting the
    /// remaining truck path into atomic operations.
    #[must_use]
    pub fn simplify(&self, instance: &Instance) -> Solution {
        let mut covered = CoverSet::singleton(instance.depot());
        let mut result = vec![];
        for operation in &self.operations {
            covered = covered.insert(operation.start).insert(operation.end);

            let mut drive = vec![];
            for &node in &operation.drive {
                if !covered.contains(node) {
                    covered = covered.insert(node);
                    drive.push(node);
                }
            }

            match operation.fly {
                Some(fly) if covered.contains(fly) => {
                    let mut previous = operation.start;
                    for &node in &drive {
                        result.push(Operation::atomic(previous, node));
                        previous = node;
                    }
                    result.push(Operation::atomic(previous, operation.end));
                }
                fly => {
                    if let Some(fly) = fly {
                        covered = covered.insert(fly);
                    }
                    result.push(Operation::new(operation.start, drive, operation.end, fly));
                }
            }
        }

        let simplified = Solution::new(result, instance);
        debug_assert!(simplified.cost <= self.cost + EPS);
        simplified
    }

    /// The truck's visiting order, depot to depot, fly nodes excluded.
    pub fn truck_order(&self) -> Vec<usize> {
        let mut order = vec![];
        for (i, operation) in self.operations.iter().enumerate() {
            if i == 0 {
                order.push(operation.start);
            }
            order.extend_from_slice(&operation.drive);
            order.push(operation.end);
        }

        order
    }
}

/// Render a solution in the interchange format: the operation count, one
/// record per operation, and a trailing comment with the total cost.
pub fn write_solution(solution: &Solution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", solution.operations.len());
    for operation in &solution.operations {
        let fly = operation.fly.map_or(-1, |f| f as i64);
        let _ = write!(
            out,
            "{} {} {} {}",
            operation.start,
            operation.end,
            fly,
            operation.drive.len()
        );
        for &node in &operation.drive {
            let _ = write!(out, " {node}");
        }
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "/* cost {} */", solution.cost);

    out
}

pub fn read_solution(text: &str, instance: &Instance) -> Result<Solution, SolverError> {
    let stripped = strip_comments(text);
    let mut tokens = stripped.split_whitespace();
    let mut next = |what: &str| {
        tokens
            .next()
            .ok_or_else(|| SolverError::invalid(format!("solution file ended while reading {what}")))
    };

    let count = next("the operation count")?
        .parse::<usize>()
        .map_err(|_| SolverError::invalid("bad operation count"))?;

    let mut operations = vec![];
    for _ in 0..count {
        let start = parse_index(next("an operation start")?, instance)?;
        let end = parse_index(next("an operation end")?, instance)?;
        let fly = next("a fly index")?
            .parse::<i64>()
            .map_err(|_| SolverError::invalid("bad fly index"))?;
        let fly = if fly < 0 {
            None
        } else if (fly as usize) < instance.n() {
            Some(fly as usize)
        } else {
            return Err(SolverError::invalid(format!("fly index {fly} out of range")));
        };

        let internal = next("an internal count")?
            .parse::<usize>()
            .map_err(|_| SolverError::invalid("bad internal count"))?;
        let mut drive = vec![];
        for _ in 0..internal {
            drive.push(parse_index(next("an internal index")?, instance)?);
        }

        if fly.is_some_and(|f| drive.contains(&f) || f == start || f == end) {
            return Err(SolverError::invalid("operation reuses its fly node"));
        }

        operations.push(Operation::new(start, drive, end, fly));
    }

    Ok(Solution::new(operations, instance))
}

pub fn read_solution_file(path: &Path, instance: &Instance) -> Result<Solution, SolverError> {
    read_solution(&fs::read_to_string(path)?, instance)
}

fn parse_index(token: &str, instance: &Instance) -> Result<usize, SolverError> {
    let index = token
        .parse::<usize>()
        .map_err(|_| SolverError::invalid(format!("bad location index {token:?}")))?;
    if index >= instance.n() {
        return Err(SolverError::invalid(format!("location index {index} out of range")));
    }

    Ok(index)
}
