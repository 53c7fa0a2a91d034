use std::collections::HashMap;

use crate::errors::SolverError;
use crate::operations::Operation;

/// Chain a multiset of operation arcs into one closed walk from the depot
/// by Hierholzer's rule: walk until the current circuit closes, then splice
/// sub-walks from any visited vertex that still has unused outgoing arcs.
pub fn assemble(operations: Vec<Operation>, depot: usize) -> Result<Vec<Operation>, SolverError> {
    if operations.is_empty() {
        return Err(SolverError::IllFormedGraph("no operations selected".into()));
    }

    let mut remaining = operations.len();
    let mut adjacency: HashMap<usize, Vec<Operation>> = HashMap::new();
    for operation in operations {
        adjacency.entry(operation.start).or_default().push(operation);
    }

    let mut walk = subwalk(depot, &mut adjacency, &mut remaining)?;
    while remaining > 0 {
        let branch = walk
            .iter()
            .position(|operation| {
                adjacency
                    .get(&operation.start)
                    .is_some_and(|arcs| !arcs.is_empty())
            })
            .ok_or_else(|| {
                SolverError::IllFormedGraph("unused arcs unreachable from the walk".into())
            })?;

        let vertex = walk[branch].start;
        let spliced = subwalk(vertex, &mut adjacency, &mut remaining)?;
        walk.splice(branch..branch, spliced);
    }

    Ok(walk)
}

/// Consume arcs from `from` until the circuit returns there with no way
/// out. Getting stuck anywhere else means the multidegrees are imbalanced.
fn subwalk(
    from: usize,
    adjacency: &mut HashMap<usize, Vec<Operation>>,
    remaining: &mut usize,
) -> Result<Vec<Operation>, SolverError> {
    let mut walk = vec![];
    let mut current = from;
    loop {
        let arcs = adjacency.entry(current).or_default();
        match arcs.pop() {
            Some(operation) => {
                *remaining -= 1;
                current = operation.end;
                walk.push(operation);
            }
            None if current == from => return Ok(walk),
            None => {
                return Err(SolverError::IllFormedGraph(format!(
                    "walk stranded at location {current}"
                )));
            }
        }
    }
}
