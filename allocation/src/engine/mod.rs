//! LP/MIP engines the optimization solver delegates to.
//!
//! The solver describes its program with [`LinearProgram`]: bounded non-negative variables with
//! objective weights, to be maximized subject to capacity rows of the form
//! `sum(variables) <= capacity`. Each call to [`Engine::solve`] builds a fresh engine session, so
//! engines can be shared between threads.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

mod cbc;
mod microlp;

pub use cbc::Cbc;
pub use microlp::MicroLp;

/// Whether variables must take whole values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Integrality {
    /// Variables are declared integer; requires an engine with integer programming support.
    Integer,
    /// Linear relaxation; values may be fractional and are rounded by the caller.
    Continuous,
}

impl Default for Integrality {
    fn default() -> Self {
        Self::Integer
    }
}

/// A decision variable `0 <= x <= upper_bound` with its objective coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Name, unique within the program and safe to use in LP files.
    pub name: String,
    /// Upper bound of the variable.
    pub upper_bound: f64,
    /// Objective coefficient.
    pub weight: f64,
}

/// Constraint `sum(variables) <= capacity`, with variables given by their indices.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRow {
    /// Indices of the constrained variables.
    pub variables: Vec<usize>,
    /// Right-hand side.
    pub capacity: f64,
}

/// Maximization program handed to an [`Engine`].
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    /// Decision variables.
    pub variables: Vec<VariableSpec>,
    /// Capacity constraints.
    pub rows: Vec<CapacityRow>,
    /// Integrality of all variables.
    pub integrality: Integrality,
}

/// Final status reported by an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found.
    Optimal,
    /// The program has no feasible solution.
    Infeasible,
}

/// Status and variable values, in the order of [`LinearProgram::variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSolution {
    /// Solve status.
    pub status: SolveStatus,
    /// Variable values; empty unless the status is optimal.
    pub values: Vec<f64>,
}

impl EngineSolution {
    /// Optimal solution with the given values.
    #[must_use]
    pub fn optimal(values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            values,
        }
    }

    /// Infeasible program.
    #[must_use]
    pub fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            values: Vec::new(),
        }
    }
}

/// Errors used when running an engine.
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
pub enum EngineError {
    #[error("The solver has timed out in {0:#?}")]
    Timeout(Duration),
    #[error("Could not write to {file}: {source}")]
    WriteModel { source: io::Error, file: PathBuf },
    #[error("Error executing solver: {0}")]
    SolverCommand(String),
    #[error("Error reading solution: {0}")]
    ReadSolution(String),
    #[error("Solver failed: {0}")]
    Solver(String),
}

/// An LP/MIP engine.
pub trait Engine: Send + Sync {
    /// Solves `program`, giving up once `deadline` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine could not run, did not finish in time, or stopped without
    /// a definite status.
    fn solve(
        &self,
        program: &LinearProgram,
        deadline: Option<Duration>,
    ) -> Result<EngineSolution, EngineError>;
}
