//! CBC engine based on the solver runner from `lp_modeler`, extended with a deadline.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use lp_modeler::dsl::{
    lp_sum, BoundableLp, LpContinuous, LpExpression, LpInteger, LpObjective, LpOperations,
    LpProblem,
};
use lp_modeler::format::lp_format::*;
use lp_modeler::solvers::Status;
use uuid::Uuid;

use super::{Engine, EngineError, EngineSolution, Integrality, LinearProgram};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Largest magnitude `lp_modeler` coefficients (`f32`) hold exactly: 2^24.
const MAX_EXACT_VALUE: f64 = 16_777_216.0;

/// Runs the external `cbc` executable on a model written in LP format.
///
/// Every solve writes its own model and solution files, named by a random UUID, into the
/// working directory and removes them afterwards. When a deadline is given and expires, the
/// child process is killed.
///
/// Models are written with single-precision coefficients, so programs whose bounds, weights, or
/// capacities exceed 2^24 (16 777 216) are rejected with [`EngineError::Solver`] rather than
/// solved with rounded values. Use [`MicroLp`](super::MicroLp) for larger quantities.
#[derive(Debug, Clone)]
pub struct Cbc {
    command_name: String,
    work_dir: PathBuf,
}

impl Default for Cbc {
    fn default() -> Self {
        Self {
            command_name: "cbc".to_string(),
            work_dir: std::env::temp_dir(),
        }
    }
}

impl Cbc {
    /// Sets the name or path of the CBC executable.
    #[must_use]
    pub fn command_name<S: Into<String>>(mut self, command_name: S) -> Self {
        self.command_name = command_name.into();
        self
    }

    /// Sets the directory for temporary model and solution files.
    #[must_use]
    pub fn work_dir<P: Into<PathBuf>>(mut self, work_dir: P) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    fn run(
        &self,
        model_file: &Path,
        solution_file: &Path,
        deadline: Option<Duration>,
    ) -> Result<(Status, HashMap<String, f64>), EngineError> {
        let mut child = Command::new(&self.command_name)
            .arg(model_file)
            .arg("solve")
            .arg("solution")
            .arg(solution_file)
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| EngineError::SolverCommand(e.to_string()))?;
        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|_| EngineError::SolverCommand("Error attempting to wait".into()))?
            {
                return if status.success() {
                    read_solution(solution_file).map_err(EngineError::ReadSolution)
                } else {
                    Err(EngineError::SolverCommand(status.to_string()))
                };
            }
            if let Some(timeout) = deadline {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(EngineError::Timeout(timeout));
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Engine for Cbc {
    fn solve(
        &self,
        program: &LinearProgram,
        deadline: Option<Duration>,
    ) -> Result<EngineSolution, EngineError> {
        check_precision(program)?;
        let session = Uuid::new_v4();
        let model_file = self.work_dir.join(format!("{}.lp", session));
        let solution_file = self.work_dir.join(format!("{}.sol", session));
        lp_problem(program)
            .write_lp(&model_file.to_string_lossy())
            .map_err(|e| EngineError::WriteModel {
                source: e,
                file: model_file.clone(),
            })?;
        let result = self.run(&model_file, &solution_file, deadline);
        let _ = fs::remove_file(&model_file);
        let _ = fs::remove_file(&solution_file);
        let (status, values) = result?;
        match status {
            Status::Optimal => Ok(EngineSolution::optimal(
                program
                    .variables
                    .iter()
                    // CBC omits variables equal to zero.
                    .map(|spec| values.get(&spec.name).copied().unwrap_or(0.0))
                    .collect(),
            )),
            Status::Infeasible => Ok(EngineSolution::infeasible()),
            status => Err(EngineError::Solver(format!("{:?}", status))),
        }
    }
}

/// Fails if any value of the program would lose precision as an `f32`.
fn check_precision(program: &LinearProgram) -> Result<(), EngineError> {
    let values = program
        .variables
        .iter()
        .flat_map(|spec| vec![("bound", spec.upper_bound), ("weight", spec.weight)])
        .chain(program.rows.iter().map(|row| ("capacity", row.capacity)));
    for (kind, value) in values {
        if value.abs() > MAX_EXACT_VALUE {
            return Err(EngineError::Solver(format!(
                "{} {} exceeds the CBC precision limit of {}",
                kind, value, MAX_EXACT_VALUE
            )));
        }
    }
    Ok(())
}

/// Translates the program into an `lp_modeler` problem.
fn lp_problem(program: &LinearProgram) -> LpProblem {
    let mut problem = LpProblem::new("Resource allocation", LpObjective::Maximize);
    let (weighted, unit): (Vec<LpExpression>, Vec<LpExpression>) = program
        .variables
        .iter()
        .map(|spec| {
            let upper_bound = spec.upper_bound as f32;
            let weight = spec.weight as f32;
            match program.integrality {
                Integrality::Integer => {
                    let x = LpInteger::new(&spec.name)
                        .lower_bound(0.0)
                        .upper_bound(upper_bound);
                    (weight * &x, 1.0_f32 * &x)
                }
                Integrality::Continuous => {
                    let x = LpContinuous::new(&spec.name)
                        .lower_bound(0.0)
                        .upper_bound(upper_bound);
                    (weight * &x, 1.0_f32 * &x)
                }
            }
        })
        .unzip();
    problem += lp_sum(&weighted);
    for row in &program.rows {
        let used: Vec<_> = row.variables.iter().map(|&i| unit[i].clone()).collect();
        problem += lp_sum(&used).le(row.capacity as f32);
    }
    problem
}

fn read_solution(path: &Path) -> Result<(Status, HashMap<String, f64>), String> {
    let file = File::open(path).map_err(|_| "Cannot open file".to_string())?;
    parse_solution(BufReader::new(file))
}

/// Parses a CBC solution: a status line followed by `index name value reduced-cost` rows,
/// where rows of infeasible values are prefixed with `**`.
fn parse_solution<R: BufRead>(mut reader: R) -> Result<(Status, HashMap<String, f64>), String> {
    let mut buffer = String::new();
    reader.read_line(&mut buffer).map_err(|e| e.to_string())?;
    let status = match buffer.split_whitespace().next() {
        Some("Optimal") => Status::Optimal,
        // Infeasible status is either "Infeasible" or "Integer infeasible"
        Some("Infeasible") | Some("Integer") => Status::Infeasible,
        Some("Unbounded") => Status::Unbounded,
        // "Stopped" can be "on time", "on iterations", "on difficulties" or "on ctrl-c"
        Some("Stopped") => Status::SubOptimal,
        Some(_) => Status::NotSolved,
        None => return Err("Incorrect solution format".to_string()),
    };
    let mut values = HashMap::new();
    for line in reader.lines() {
        let line = line.map_err(|e| e.to_string())?;
        let mut fields: Vec<_> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields[0] == "**" {
            fields.remove(0);
        }
        if fields.len() != 4 {
            return Err("Incorrect solution format".to_string());
        }
        let value = fields[2].parse::<f64>().map_err(|e| e.to_string())?;
        values.insert(fields[1].to_string(), value);
    }
    Ok((status, values))
}
