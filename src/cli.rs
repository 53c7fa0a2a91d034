use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum FileFormat {
    Geometric,
    Graph,
    Matrix,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Geometric => "geometric",
                Self::Graph => "graph",
                Self::Matrix => "matrix",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum SolverKind {
    Exact,
    Dp,
    Greedy,
    MurrayChu,
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Exact => "exact",
                Self::Dp => "dp",
                Self::Greedy => "greedy",
                Self::MurrayChu => "murray-chu",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum SeedTour {
    Mst,
    Random,
}

impl fmt::Display for SeedTour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Mst => "mst",
                Self::Random => "random",
            }
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum GeneratorKind {
    Uniform,
    SingleCenter,
    DoubleCenter,
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Uniform => "uniform",
                Self::SingleCenter => "single-center",
                Self::DoubleCenter => "double-center",
            }
        )
    }
}

#[derive(Debug, Parser)]
#[command(
    long_about = "Truck-and-drone routing: minimize the makespan of a joint tour serving every customer from a single depot",
    propagate_version = true,
    version
)]
pub struct Arguments {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Solve an instance file
    Solve {
        /// Path to the instance file
        instance: String,

        /// Instance file format
        #[arg(short, long, default_value_t = FileFormat::Geometric)]
        format: FileFormat,

        /// The solver to run
        #[arg(short, long, default_value_t = SolverKind::MurrayChu)]
        solver: SolverKind,

        /// Starting tour fed to the heuristic solvers
        #[arg(long, default_value_t = SeedTour::Mst)]
        seed_tour: SeedTour,

        /// Wrap the heuristic in the swap/2-opt/insert order search
        #[arg(long)]
        iterate: bool,

        /// Run the greedy heuristic's second targeted pass
        #[arg(long)]
        two_pass: bool,

        /// Drone range as a multiple of the longest drone leg (exact
        /// solver only; 2 or more imposes nothing)
        #[arg(long, default_value_t = f64::INFINITY)]
        max_range_factor: f64,

        /// Truck-only customers allowed per operation (exact solver
        /// only; negative means unrestricted)
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        max_cardinality: isize,

        /// Largest instance the exact solver accepts
        #[arg(long, default_value_t = drone_tsp::solvers::exact::DEFAULT_SOFT_CAP)]
        exact_cap: usize,

        /// Seed for the random starting tour
        #[arg(long)]
        seed: Option<u64>,

        /// The directory to store results
        #[arg(short, long, default_value_t = String::from("outputs/"))]
        output: String,

        /// Append the current date to result file names
        #[arg(long)]
        date: bool,

        /// Replace existing result files instead of failing
        #[arg(long)]
        overwrite: bool,

        /// Place results in a subfolder named after the instance
        #[arg(long)]
        subfolder: bool,

        /// Print per-step progress
        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-validate a solution file against its instance
    Evaluate {
        /// Path to the solution file
        solution: String,

        /// Path to the instance file
        instance: String,

        /// Instance file format
        #[arg(short, long, default_value_t = FileFormat::Geometric)]
        format: FileFormat,
    },

    /// Generate a random geometric instance
    Generate {
        /// Point distribution
        #[arg(default_value_t = GeneratorKind::Uniform)]
        kind: GeneratorKind,

        /// Number of customers (excluding the depot)
        #[arg(short, long, default_value_t = 10)]
        customers: usize,

        /// Drone speed as a multiple of the truck speed
        #[arg(short, long, default_value_t = 2.0)]
        alpha: f64,

        /// Seed for the generator
        #[arg(long)]
        seed: Option<u64>,

        /// The directory to store the instance
        #[arg(short, long, default_value_t = String::from("outputs/"))]
        output: String,

        /// Append the current date to the instance file name
        #[arg(long)]
        date: bool,

        /// Replace an existing instance file instead of failing
        #[arg(long)]
        overwrite: bool,

        /// Place the instance in a subfolder named after the generator
        #[arg(long)]
        subfolder: bool,
    },
}
