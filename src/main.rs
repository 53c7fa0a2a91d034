use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::StdRng;

mod cli;
mod config;
mod logger;

use drone_tsp::errors::SolverError;
use drone_tsp::instance::{Instance, InstanceKind, read_file, serialize};
use drone_tsp::operations::read_solution_file;
use drone_tsp::solvers::exact::ExactSolver;
use drone_tsp::solvers::fixed_order::FixedOrderDp;
use drone_tsp::solvers::greedy::GreedyFixedOrder;
use drone_tsp::solvers::initial::{mst_tour, order_cost, random_tour};
use drone_tsp::solvers::iterative::IterativeImprovement;
use drone_tsp::solvers::murray_chu::MurrayChu;
use drone_tsp::solvers::{CancelToken, FixedOrderSolver, Solver};
use drone_tsp::{generator, operations};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> ExitCode {
    match run(cli::Arguments::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

fn run(arguments: cli::Arguments) -> Result<(), SolverError> {
    match arguments.command {
        cli::Commands::Solve {
            instance,
            format,
            solver,
            seed_tour,
            iterate,
            two_pass,
            max_range_factor,
            max_cardinality,
            exact_cap,
            seed,
            output,
            date,
            overwrite,
            subfolder,
            verbose,
        } => {
            let logger = logger::Logger::new(verbose);
            let loaded = read_instance(&instance, format)?;
            logger.step(&format!("loaded {} locations from {instance}", loaded.n()));

            let cancel = CancelToken::new();
            let solution = match solver {
                cli::SolverKind::Exact => ExactSolver {
                    max_range_factor,
                    max_cardinality,
                    soft_cap: exact_cap,
                }
                .solve(&loaded, &cancel)?,
                heuristic => {
                    let order = match seed_tour {
                        cli::SeedTour::Mst => mst_tour(&loaded)?,
                        cli::SeedTour::Random => match seed {
                            Some(seed) => random_tour(&loaded, &mut StdRng::seed_from_u64(seed)),
                            None => random_tour(&loaded, &mut rand::rng()),
                        },
                    };
                    logger.step(&format!(
                        "{seed_tour} seed tour costs {:.6}",
                        order_cost(&loaded, &order)
                    ));

                    match heuristic {
                        cli::SolverKind::Dp => {
                            solve_order(FixedOrderDp, iterate, &loaded, &order, &cancel)?
                        }
                        cli::SolverKind::Greedy => solve_order(
                            GreedyFixedOrder { two_pass },
                            iterate,
                            &loaded,
                            &order,
                            &cancel,
                        )?,
                        cli::SolverKind::MurrayChu => {
                            solve_order(MurrayChu, iterate, &loaded, &order, &cancel)?
                        }
                        cli::SolverKind::Exact => unreachable!(),
                    }
                }
            };

            logger.summary(&solution);
            let outputs = config::OutputConfig::new(&output, date, overwrite, subfolder);
            let stem = config::stem(&instance);
            logger.finalize(&solution, &outputs, &stem, &format!("{stem}-{solver}"))
        }

        cli::Commands::Evaluate {
            solution,
            instance,
            format,
        } => {
            let loaded = read_instance(&instance, format)?;
            let solution = read_solution_file(Path::new(&solution), &loaded)?;
            logger::Logger::new(false).summary(&solution);

            let simplified = solution.simplify(&loaded);
            if simplified.operations != solution.operations {
                println!(
                    "simplification removes revisits: {} -> {} operations",
                    solution.operations.len(),
                    simplified.operations.len()
                );
            }

            Ok(())
        }

        cli::Commands::Generate {
            kind,
            customers,
            alpha,
            seed,
            output,
            date,
            overwrite,
            subfolder,
        } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let instance = match kind {
                cli::GeneratorKind::Uniform => generator::uniform(customers, alpha, &mut rng)?,
                cli::GeneratorKind::SingleCenter => {
                    generator::single_center(customers, alpha, &mut rng)?
                }
                cli::GeneratorKind::DoubleCenter => {
                    generator::double_center(customers, alpha, &mut rng)?
                }
            };

            let outputs = config::OutputConfig::new(&output, date, overwrite, subfolder);
            let path = outputs.resolve(
                &kind.to_string(),
                &format!("{kind}-{customers}"),
                "txt",
            )?;
            std::fs::write(&path, serialize(&instance))?;
            println!("Wrote instance to {}", path.display());

            Ok(())
        }
    }
}

fn read_instance(path: &str, format: cli::FileFormat) -> Result<Instance, SolverError> {
    let kind = match format {
        cli::FileFormat::Geometric => InstanceKind::Geometric,
        cli::FileFormat::Graph => InstanceKind::Graph,
        cli::FileFormat::Matrix => InstanceKind::Matrix,
    };
    read_file(Path::new(path), kind)
}

fn solve_order<S: FixedOrderSolver>(
    solver: S,
    iterate: bool,
    instance: &Instance,
    order: &[usize],
    cancel: &CancelToken,
) -> Result<operations::Solution, SolverError> {
    if iterate {
        IterativeImprovement::new(solver).solve_order(instance, order, cancel)
    } else {
        solver.solve_order(instance, order, cancel)
    }
}
