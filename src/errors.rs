use thiserror::Error;

/// Tolerance shared by the table integrity check, MIP variable rounding and
/// the cost-equivalence check during solution simplification.
pub const EPS: f64 = 1e-8;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("instance has {locations} locations, limit is {limit}")]
    InstanceTooLarge { locations: usize, limit: usize },

    #[error("no feasible tour exists")]
    Infeasible,

    #[error("optimization backend failed: {0}")]
    Backend(String),

    #[error("table entry {entry} stores cost {stored} but the operation evaluates to {recomputed}")]
    TableIntegrity {
        entry: usize,
        stored: f64,
        recomputed: f64,
    },

    #[error("ill-formed operation graph: {0}")]
    IllFormedGraph(String),

    #[error("customer {0} appears more than once in the fixed order")]
    NonAtomicInput(usize),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SolverError {
    pub fn invalid<T: Into<String>>(message: T) -> Self {
        Self::InvalidInput(message.into())
    }
}
