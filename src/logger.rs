use std::fs::File;
use std::io::Write;
use std::time::Instant;

use colored::Colorize;

use drone_tsp::errors::SolverError;
use drone_tsp::operations::{Solution, write_solution};

use crate::config::OutputConfig;

/// Progress and result reporting for one solver run.
pub struct Logger {
    verbose: bool,
    started: Instant,
}

impl Logger {
    pub fn new(verbose: bool) -> Logger {
        Logger {
            verbose,
            started: Instant::now(),
        }
    }

    pub fn step(&self, message: &str) {
        if self.verbose {
            println!(
                "{} {}",
                format!("[{:>8.3}s]", self.started.elapsed().as_secs_f64()).dimmed(),
                message
            );
        }
    }

    pub fn summary(&self, solution: &Solution) {
        let status = if solution.is_feasible() {
            "feasible".green()
        } else {
            "infeasible".red()
        };
        println!(
            "{} solution with {} operations, cost {}",
            status,
            solution.operations.len(),
            format!("{:.6}", solution.cost).bold()
        );
        println!(
            "  truck {:.6} (waiting {:.6}), drone {:.6} (waiting {:.6}), slowest operation {:.6}",
            solution.truck_cost,
            solution.truck_waiting,
            solution.drone_cost,
            solution.drone_waiting,
            solution.max_operation_cost
        );
    }

    /// Write the solution in the interchange format plus a JSON report.
    pub fn finalize(
        &self,
        solution: &Solution,
        config: &OutputConfig,
        group: &str,
        stem: &str,
    ) -> Result<(), SolverError> {
        let text = config.resolve(group, stem, "txt")?;
        File::create(&text)?.write_all(write_solution(solution).as_bytes())?;
        println!("Wrote solution to {}", text.display());

        let json = config.resolve(group, &format!("{stem}-report"), "json")?;
        File::create(&json)?.write_all(
            serde_json::to_string_pretty(solution)
                .map_err(|error| SolverError::invalid(error.to_string()))?
                .as_bytes(),
        )?;
        println!("Wrote report to {}", json.display());

        Ok(())
    }
}
