//! This crate allocates units of constrained resources among competing projects.
//!
//! Two policies are available:
//!
//! - [`GreedySolver`] ranks projects by a [`Strategy`] and hands out resources first come, first
//!   served, never revisiting earlier decisions;
//! - [`OptimalSolver`] builds a priority-weighted linear program and delegates it to an LP/MIP
//!   [`Engine`].
//!
//! Both aggregate the input resources into a [`ResourcePool`] first and report an [`Assignment`]
//! carrying per-project completion rates computed by a [`CompletionPolicy`].
//!
//! # Examples
//!
//! ```
//! # use allocation::{solve_greedy, Criterion, Direction, Project, Resource, Strategy};
//! let resources = vec![Resource::new("R1", "CPU", 8, 1), Resource::new("R2", "GPU", 5, 3)];
//! let projects = vec![
//!     Project::new("P1", "Search", vec![("R1", 6), ("R2", 5)], 2),
//!     Project::new("P2", "Index", vec![("R1", 4)], 1),
//! ];
//! let strategy = Strategy::new(Criterion::ByTotalSize, Direction::LargestFirst);
//! let assignment = solve_greedy(&resources, &projects, strategy);
//! assert_eq!(assignment.completion(&"P1".into()), Some(100.0));
//! assert_eq!(assignment.completion(&"P2".into()), Some(50.0));
//! ```

#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![deny(unsafe_code)]

mod completion;
mod engine;
mod greedy;
mod model;
mod optimal;
mod pool;
pub mod request;

pub use completion::{AverageCompletion, CompletionMethod, CompletionPolicy, WeightedCompletion};
pub use engine::{
    CapacityRow, Cbc, Engine, EngineError, EngineSolution, Integrality, LinearProgram, MicroLp,
    SolveStatus, VariableSpec,
};
pub use greedy::{Criterion, Direction, GreedySolver, Strategy};
pub use model::{Assignment, Chunk, Project, ProjectAllocation, ProjectId, Resource, ResourceId};
pub use optimal::{weighted_utilization, OptimalSolver, Outcome};
pub use pool::ResourcePool;
pub use request::{AllocationRequest, Method, Problem, ValidationError};

/// Error type encompassing all allocation errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request was rejected before any solver ran.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
    /// The LP engine failed to produce a solution.
    #[error("LP engine failed: {0}")]
    Engine(#[from] EngineError),
}

/// Result alias using [`Error`](enum.Error.html).
pub type Result<T> = std::result::Result<T, Error>;

/// Assigns `resources` to `projects` with a [`GreedySolver`] using the given strategy and the
/// canonical [`WeightedCompletion`] metric.
///
/// Never fails: in the worst case the returned assignment is empty.
#[must_use]
pub fn solve_greedy(resources: &[Resource], projects: &[Project], strategy: Strategy) -> Assignment {
    GreedySolver::new(strategy).solve(&ResourcePool::aggregate(resources), projects)
}

/// Assigns `resources` to `projects` with the default [`OptimalSolver`]: an integer program
/// solved by [`MicroLp`] without a deadline.
#[must_use]
pub fn solve_optimal(resources: &[Resource], projects: &[Project]) -> Outcome {
    OptimalSolver::default().solve(&ResourcePool::aggregate(resources), projects)
}
