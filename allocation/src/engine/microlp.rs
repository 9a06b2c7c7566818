use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use good_lp::{
    constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable,
};

use super::{Engine, EngineError, EngineSolution, Integrality, LinearProgram};

/// Pure-Rust engine backed by `good_lp` with the `microlp` solver.
///
/// Supports integer variables through branch and bound. With a deadline, the solve runs on a
/// separate thread which is abandoned when the deadline expires. `microlp` cannot be interrupted,
/// so an abandoned thread keeps its core busy until the solve finishes on its own, and its result
/// is discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct MicroLp;

impl Engine for MicroLp {
    fn solve(
        &self,
        program: &LinearProgram,
        deadline: Option<Duration>,
    ) -> Result<EngineSolution, EngineError> {
        let timeout = match deadline {
            Some(timeout) => timeout,
            None => return solve_program(program),
        };
        let program = program.clone();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            // If it couldn't be sent, the caller has already given up.
            let _ = tx.send(solve_program(&program));
        });
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Solver(
                "solver thread terminated without a result".into(),
            )),
        }
    }
}

fn solve_program(program: &LinearProgram) -> Result<EngineSolution, EngineError> {
    let mut vars = variables!();
    let xs: Vec<Variable> = program
        .variables
        .iter()
        .map(|spec| {
            let definition = variable().min(0).max(spec.upper_bound);
            vars.add(match program.integrality {
                Integrality::Integer => definition.integer(),
                Integrality::Continuous => definition,
            })
        })
        .collect();
    let objective: Expression = program
        .variables
        .iter()
        .zip(&xs)
        .map(|(spec, &x)| spec.weight * x)
        .sum();
    let mut model = vars.maximise(objective).using(good_lp::microlp);
    for row in &program.rows {
        let used: Expression = row.variables.iter().map(|&index| xs[index]).sum();
        model = model.with(constraint!(used <= row.capacity));
    }
    match model.solve() {
        Ok(solution) => Ok(EngineSolution::optimal(
            xs.iter().map(|&x| solution.value(x)).collect(),
        )),
        Err(ResolutionError::Infeasible) => Ok(EngineSolution::infeasible()),
        Err(err) => Err(EngineError::Solver(err.to_string())),
    }
}
