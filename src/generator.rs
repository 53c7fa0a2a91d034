use rand::Rng;
use std::f64::consts::TAU;

use crate::errors::SolverError;
use crate::instance::Instance;

/// Side length of the square all generators draw from.
const AREA: f64 = 100.0;

/// Clustered generators place customers in disks of this radius around
/// their centers.
const CLUSTER_RADIUS: f64 = AREA / 4.0;

fn check_parameters(customers: usize, alpha: f64) -> Result<(), SolverError> {
    if customers == 0 {
        return Err(SolverError::invalid("need at least one customer"));
    }
    if alpha <= 0.0 {
        return Err(SolverError::invalid("alpha must be positive"));
    }

    Ok(())
}

fn build<R: Rng>(
    customers: usize,
    alpha: f64,
    rng: &mut R,
    mut place: impl FnMut(&mut R) -> (f64, f64),
) -> Result<Instance, SolverError> {
    let mut names = vec!["depot".to_owned()];
    let mut x = vec![AREA / 2.0];
    let mut y = vec![AREA / 2.0];
    for i in 1..=customers {
        let (px, py) = place(rng);
        names.push(format!("c{i}"));
        x.push(px);
        y.push(py);
    }

    // The truck drives at unit speed; alpha is the drone speed factor.
    Instance::geometric(names, x, y, 1.0, alpha)
}

/// Customers uniform over the square, depot at its center.
pub fn uniform<R: Rng>(customers: usize, alpha: f64, rng: &mut R) -> Result<Instance, SolverError> {
    check_parameters(customers, alpha)?;
    build(customers, alpha, rng, |rng| {
        (rng.random_range(0.0..AREA), rng.random_range(0.0..AREA))
    })
}

fn in_disk<R: Rng>(rng: &mut R, center: (f64, f64)) -> (f64, f64) {
    let radius = CLUSTER_RADIUS * rng.random::<f64>().sqrt();
    let angle = rng.random_range(0.0..TAU);
    (
        center.0 + radius * angle.cos(),
        center.1 + radius * angle.sin(),
    )
}

/// Customers clustered in one disk around a random center.
pub fn single_center<R: Rng>(
    customers: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Instance, SolverError> {
    check_parameters(customers, alpha)?;
    let center = (
        rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
        rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
    );
    build(customers, alpha, rng, |rng| in_disk(rng, center))
}

/// Customers split between two random cluster centers.
pub fn double_center<R: Rng>(
    customers: usize,
    alpha: f64,
    rng: &mut R,
) -> Result<Instance, SolverError> {
    check_parameters(customers, alpha)?;
    let centers = [
        (
            rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
            rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
        ),
        (
            rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
            rng.random_range(CLUSTER_RADIUS..AREA - CLUSTER_RADIUS),
        ),
    ];
    let mut toggle = false;
    build(customers, alpha, rng, move |rng| {
        toggle = !toggle;
        in_disk(rng, centers[usize::from(toggle)])
    })
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::{double_center, single_center, uniform};
    use crate::errors::SolverError;
    use crate::instance::Instance;

    #[test]
    fn generates_requested_sizes() {
        type Generator = fn(usize, f64, &mut StdRng) -> Result<Instance, SolverError>;

        let mut rng = StdRng::seed_from_u64(7);
        let generators: [Generator; 3] = [uniform, single_center, double_center];
        for generator in generators {
            let instance = generator(9, 2.0, &mut rng).unwrap();
            assert_eq!(instance.n(), 10);
            assert!(instance.is_depot(0));
            assert_eq!(instance.locations[3].name, "c3");
        }
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = uniform(5, 2.0, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = uniform(5, 2.0, &mut StdRng::seed_from_u64(42)).unwrap();
        for (la, lb) in a.locations.iter().zip(&b.locations) {
            assert_eq!(la.x, lb.x);
            assert_eq!(la.y, lb.y);
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(uniform(0, 2.0, &mut rng).is_err());
        assert!(uniform(5, 0.0, &mut rng).is_err());
        assert!(uniform(5, -1.0, &mut rng).is_err());
        assert!(uniform(40, 2.0, &mut rng).is_err());
    }
}
