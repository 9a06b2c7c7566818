//! Optimal allocation through linear programming.
//!
//! For every project `p` and resource `r` such that `p` requires `r` and `r` has capacity, the
//! solver introduces a variable `0 <= x[r, p] <= min(capacity[r], required[p][r])` and maximizes
//! `sum(weight(p) * x[r, p])` subject to `sum_p(x[r, p]) <= capacity[r]` for each resource,
//! where `weight(p) = 1 + max(priority(p), 0)`.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;

use crate::engine::{CapacityRow, LinearProgram, SolveStatus, VariableSpec};
use crate::{
    Assignment, Chunk, CompletionPolicy, Engine, EngineError, Integrality, MicroLp, Project,
    ProjectAllocation, ResourceId, ResourcePool, Result, WeightedCompletion,
};

/// Result of an optimization solve.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The engine proved optimality; projects that received nothing are left out.
    Optimal(Assignment),
    /// The engine reported the program infeasible.
    Infeasible,
    /// No project has any positive requirement; the engine was not called.
    Empty,
    /// The engine failed or ran out of time.
    Aborted(String),
}

impl Outcome {
    /// Assignment of an optimal outcome.
    #[must_use]
    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Self::Optimal(assignment) => Some(assignment),
            _ => None,
        }
    }

    /// Consumes the outcome, returning the optimal assignment or an empty one.
    #[must_use]
    pub fn into_assignment(self) -> Assignment {
        match self {
            Self::Optimal(assignment) => assignment,
            _ => Assignment::default(),
        }
    }

    /// Returns `true` for [`Outcome::Optimal`].
    #[must_use]
    pub fn is_optimal(&self) -> bool {
        matches!(self, Self::Optimal(_))
    }

    /// Lowercase status label: `completed`, `infeasible`, `empty`, or `aborted`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Optimal(_) => "completed",
            Self::Infeasible => "infeasible",
            Self::Empty => "empty",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Allocator maximizing priority-weighted utilization.
///
/// Values returned by the engine are rounded to whole units, clamped to their bounds, and
/// trimmed where a resource would still be over-allocated, lowest weight first.
///
/// ```
/// # use allocation::{OptimalSolver, Project, Resource, ResourcePool, Integrality};
/// let pool = ResourcePool::aggregate(&[Resource::new("R1", "CPU", 8, 1)]);
/// let projects = vec![
///     Project::new("P1", "Search", vec![("R1", 6)], 2),
///     Project::new("P2", "Index", vec![("R1", 4)], 1),
/// ];
/// let outcome = OptimalSolver::default()
///     .integrality(Integrality::Integer)
///     .solve(&pool, &projects);
/// let assignment = outcome.assignment().unwrap();
/// assert_eq!(assignment.get(&"P1".into()).unwrap().allocated(&"R1".into()), 6);
/// assert_eq!(assignment.get(&"P2".into()).unwrap().allocated(&"R1".into()), 2);
/// ```
#[derive(Clone)]
pub struct OptimalSolver {
    engine: Arc<dyn Engine>,
    integrality: Integrality,
    deadline: Option<Duration>,
    completion: Arc<dyn CompletionPolicy>,
}

impl Default for OptimalSolver {
    fn default() -> Self {
        Self {
            engine: Arc::new(MicroLp),
            integrality: Integrality::default(),
            deadline: None,
            completion: Arc::new(WeightedCompletion),
        }
    }
}

impl std::fmt::Debug for OptimalSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimalSolver")
            .field("integrality", &self.integrality)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl OptimalSolver {
    /// Replaces the engine.
    #[must_use]
    pub fn engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engine = engine;
        self
    }

    /// Sets whether the variables are integer.
    #[must_use]
    pub fn integrality(mut self, integrality: Integrality) -> Self {
        self.integrality = integrality;
        self
    }

    /// Sets the time after which the engine is abandoned.
    #[must_use]
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Replaces the completion policy.
    #[must_use]
    pub fn completion(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.completion = policy;
        self
    }

    /// Solves the allocation, turning engine errors into [`Outcome::Aborted`].
    #[must_use]
    pub fn solve(&self, pool: &ResourcePool, projects: &[Project]) -> Outcome {
        self.try_solve(pool, projects).unwrap_or_else(|err| {
            log::warn!("Optimization aborted: {}", err);
            Outcome::Aborted(err.to_string())
        })
    }

    /// Solves the allocation.
    ///
    /// # Errors
    ///
    /// Returns an error when the engine fails, times out, or returns a malformed solution.
    pub fn try_solve(&self, pool: &ResourcePool, projects: &[Project]) -> Result<Outcome> {
        let model = AllocationModel::build(pool, projects);
        if !model.has_demand {
            log::info!("No project has positive requirements");
            return Ok(Outcome::Empty);
        }
        if model.cells.is_empty() {
            log::info!("No required resource has any capacity");
            return Ok(Outcome::Optimal(Assignment::default()));
        }
        let program = model.program(pool, self.integrality);
        log::debug!(
            "Solving program with {} variables and {} constraints",
            program.variables.len(),
            program.rows.len()
        );
        let solution = self.engine.solve(&program, self.deadline)?;
        match solution.status {
            SolveStatus::Infeasible => {
                log::info!("Program is infeasible");
                Ok(Outcome::Infeasible)
            }
            SolveStatus::Optimal => {
                if solution.values.len() != model.cells.len() {
                    return Err(EngineError::Solver(format!(
                        "expected {} values but received {}",
                        model.cells.len(),
                        solution.values.len()
                    ))
                    .into());
                }
                let quantities = model.decode(pool, &solution.values);
                let assignment = model.assignment(pool, projects, &quantities, &*self.completion);
                log::info!(
                    "Optimal solve served {} of {} projects, objective {}",
                    assignment.len(),
                    projects.len(),
                    weighted_utilization(projects, &assignment)
                );
                Ok(Outcome::Optimal(assignment))
            }
        }
    }
}

/// Variable `x[resource, project]`.
#[derive(Debug)]
struct Cell<'a> {
    project: usize,
    resource: &'a ResourceId,
    upper_bound: u64,
    weight: u64,
}

/// Variables in project order, then ascending resource ID.
#[derive(Debug)]
struct AllocationModel<'a> {
    cells: Vec<Cell<'a>>,
    rows: BTreeMap<&'a ResourceId, Vec<usize>>,
    has_demand: bool,
}

impl<'a> AllocationModel<'a> {
    fn build(pool: &ResourcePool, projects: &'a [Project]) -> Self {
        let mut cells = Vec::new();
        let mut rows: BTreeMap<_, Vec<_>> = BTreeMap::new();
        let mut has_demand = false;
        for (project_idx, project) in projects.iter().enumerate() {
            for (resource, &required) in project.requirements() {
                if required == 0 {
                    continue;
                }
                has_demand = true;
                let capacity = pool.capacity(resource);
                if capacity == 0 {
                    continue;
                }
                rows.entry(resource).or_default().push(cells.len());
                cells.push(Cell {
                    project: project_idx,
                    resource,
                    upper_bound: capacity.min(required),
                    weight: project.utility_weight(),
                });
            }
        }
        Self {
            cells,
            rows,
            has_demand,
        }
    }

    fn program(&self, pool: &ResourcePool, integrality: Integrality) -> LinearProgram {
        LinearProgram {
            variables: self
                .cells
                .iter()
                .enumerate()
                .map(|(idx, cell)| VariableSpec {
                    name: format!("x_{}", idx),
                    upper_bound: cell.upper_bound as f64,
                    weight: cell.weight as f64,
                })
                .collect(),
            rows: self
                .rows
                .iter()
                .map(|(resource, variables)| CapacityRow {
                    variables: variables.clone(),
                    capacity: pool.capacity(resource) as f64,
                })
                .collect(),
            integrality,
        }
    }

    /// Rounds engine values to whole units that respect bounds and capacities.
    fn decode(&self, pool: &ResourcePool, values: &[f64]) -> Vec<u64> {
        let mut quantities: Vec<u64> = self
            .cells
            .iter()
            .zip(values)
            .map(|(cell, value)| (value.round().max(0.0) as u64).min(cell.upper_bound))
            .collect();
        for (resource, variables) in &self.rows {
            // Summed in `u128` so that trimming stays exact for any `u64` quantities.
            let capacity = u128::from(pool.capacity(resource));
            let used: u128 = variables
                .iter()
                .map(|&idx| u128::from(quantities[idx]))
                .sum();
            if used <= capacity {
                continue;
            }
            log::warn!(
                "Rounded allocation of {} exceeds capacity ({} > {}), trimming",
                resource,
                used,
                capacity
            );
            let mut excess = used - capacity;
            for idx in variables
                .iter()
                .copied()
                .sorted_by_key(|&idx| (self.cells[idx].weight, Reverse(idx)))
            {
                if excess == 0 {
                    break;
                }
                let cut = excess.min(u128::from(quantities[idx]));
                quantities[idx] -= cut as u64;
                excess -= cut;
            }
        }
        quantities
    }

    fn assignment(
        &self,
        pool: &ResourcePool,
        projects: &[Project],
        quantities: &[u64],
        completion: &dyn CompletionPolicy,
    ) -> Assignment {
        let mut chunks: Vec<Vec<Chunk>> = vec![Vec::new(); projects.len()];
        for (cell, &quantity) in self.cells.iter().zip(quantities) {
            if quantity > 0 {
                chunks[cell.project].push(Chunk::new(
                    cell.resource.clone(),
                    quantity,
                    pool.unit_cost(cell.resource),
                ));
            }
        }
        let mut assignment = Assignment::default();
        for (project, chunks) in projects.iter().zip(chunks) {
            if chunks.is_empty() {
                continue;
            }
            let rate = completion.completion(project, &chunks);
            assignment.push(ProjectAllocation::new(project.id().clone(), chunks, rate));
        }
        assignment
    }
}

/// Objective value of `assignment`: granted units weighted by `1 + max(priority, 0)`,
/// saturating at `u64::MAX`.
#[must_use]
pub fn weighted_utilization(projects: &[Project], assignment: &Assignment) -> u64 {
    let weights: HashMap<_, _> = projects
        .iter()
        .map(|p| (p.id(), p.utility_weight()))
        .collect();
    assignment
        .iter()
        .map(|a| {
            let weight = weights.get(a.project_id()).copied().unwrap_or(1);
            weight.saturating_mul(a.total_units())
        })
        .fold(0, u64::saturating_add)
}
