use std::io::Write;

use allocation::{
    AllocationRequest, Assignment, CompletionMethod, GreedySolver, Method, OptimalSolver, Problem,
};
use rayon::prelude::*;

use crate::{write_csv, AllocationResponse, AllocationStats, Result, Status};

/// A solved request.
#[derive(Debug, Clone)]
pub struct Allocation {
    /// Validated input.
    pub problem: Problem,
    /// Units granted to each project.
    pub assignment: Assignment,
    /// Response sent back to the client.
    pub response: AllocationResponse,
}

impl Allocation {
    /// Writes the assignment as a CSV table; see [`write_csv`].
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `writer` fails.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_csv(
            writer,
            &self.problem.resources,
            &self.problem.projects,
            &self.assignment,
        )
    }
}

/// Validates and solves allocation requests.
///
/// Requests are solved with the method they name, unless it is overridden with
/// [`Allocator::method`]. The optimal solver's engine, integrality, and deadline come from
/// [`Allocator::optimal_solver`]; the completion metric set here applies to both solvers.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    method: Option<Method>,
    optimal: OptimalSolver,
    completion: CompletionMethod,
}

impl Allocator {
    /// Overrides the method named in requests.
    #[must_use]
    pub fn method(mut self, method: Option<Method>) -> Self {
        self.method = method;
        self
    }

    /// Sets up the optimal solver.
    #[must_use]
    pub fn optimal_solver(mut self, solver: OptimalSolver) -> Self {
        self.optimal = solver;
        self
    }

    /// Sets the completion metric.
    #[must_use]
    pub fn completion(mut self, completion: CompletionMethod) -> Self {
        self.completion = completion;
        self
    }

    /// Validates and solves a single request.
    ///
    /// Solver failures are reported in the response status; only invalid requests fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the request does not validate.
    pub fn allocate(&self, request: &AllocationRequest) -> Result<Allocation> {
        let problem = request.validate()?;
        let method = self.method.unwrap_or(problem.method);
        let pool = problem.pool();
        let policy = self.completion.policy();
        let (assignment, status, reason) = match method {
            Method::Greedy => {
                let solver = GreedySolver::new(problem.strategy).completion(policy);
                (
                    solver.solve(&pool, &problem.projects),
                    Status::Completed,
                    None,
                )
            }
            Method::Optimal => {
                let outcome = self
                    .optimal
                    .clone()
                    .completion(policy)
                    .solve(&pool, &problem.projects);
                let (status, reason) = Status::of(&outcome);
                (outcome.into_assignment(), status, reason)
            }
        };
        log::info!(
            "Solved {} resources and {} projects with the {} method: {}",
            pool.len(),
            problem.projects.len(),
            method,
            status
        );
        let stats = AllocationStats::compute(&problem.resources, &problem.projects, &assignment);
        let response = AllocationResponse::new(method, status, reason, &assignment, stats);
        Ok(Allocation {
            problem,
            assignment,
            response,
        })
    }

    /// Solves independent requests in parallel, returning results in input order.
    #[must_use]
    pub fn allocate_all(&self, requests: &[AllocationRequest]) -> Vec<Result<Allocation>> {
        requests
            .par_iter()
            .map(|request| self.allocate(request))
            .collect()
    }
}
