//! Allocation command-line application.
#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::convert::TryFrom;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use allocation::{
    AllocationRequest, Cbc, CompletionMethod, Engine, Integrality, Method, MicroLp, OptimalSolver,
};
use eyre::{eyre, WrapErr};
use humantime::parse_duration;
use structopt::StructOpt;

use allocate::Allocator;

#[derive(Debug)]
struct DurationArg(Duration);

impl std::str::FromStr for DurationArg {
    type Err = eyre::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_duration(s).wrap_err("invalid time").map(DurationArg)
    }
}

/// LP engine used by the optimal method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum EngineOption {
    /// See [`MicroLp`].
    MicroLp,
    /// See [`Cbc`].
    Cbc,
}

/// Solves allocation requests and prints the responses as JSON lines.
#[derive(Debug, StructOpt)]
struct Opt {
    /// Path to a file containing a JSON request or a batch of JSON requests, one per line.
    #[structopt(short, long)]
    input: PathBuf,

    /// Solve with this method regardless of the one named in a request: greedy or optimal.
    #[structopt(long)]
    method: Option<Method>,

    /// LP engine: microlp or cbc.
    #[structopt(long, default_value = "microlp")]
    engine: EngineOption,

    /// Solve the linear relaxation instead of the integer program.
    #[structopt(long)]
    continuous: bool,

    /// Abort optimization after this time, e.g., `500ms` or `2s`.
    #[structopt(long)]
    timeout: Option<DurationArg>,

    /// Name of the CBC executable.
    #[structopt(long, default_value = "cbc")]
    cbc_command: String,

    /// Completion metric: weighted or average.
    #[structopt(long, default_value = "weighted")]
    completion: CompletionMethod,

    /// Write the assignment as a CSV table to this file. In batch mode, the request index is
    /// inserted before the extension.
    #[structopt(long)]
    csv: Option<PathBuf>,

    /// Print a summary of each allocation to the stderr.
    #[structopt(long)]
    stats: bool,

    /// Verbosity.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: i32,

    /// Store the logs this file.
    #[structopt(long)]
    log_output: Option<PathBuf>,

    /// Do not log to the stderr.
    #[structopt(long)]
    no_stderr: bool,
}

struct AllocationConfig {
    requests: Vec<AllocationRequest>,
    allocator: Allocator,
    csv: Option<PathBuf>,
    stats: bool,
}

impl TryFrom<Opt> for AllocationConfig {
    type Error = eyre::Error;
    fn try_from(opt: Opt) -> eyre::Result<Self> {
        let requests = read_requests(&opt.input)?;
        let engine: Arc<dyn Engine> = match opt.engine {
            EngineOption::MicroLp => Arc::new(MicroLp),
            EngineOption::Cbc => Arc::new(Cbc::default().command_name(opt.cbc_command)),
        };
        let integrality = if opt.continuous {
            Integrality::Continuous
        } else {
            Integrality::Integer
        };
        let solver = OptimalSolver::default()
            .engine(engine)
            .integrality(integrality)
            .deadline(opt.timeout.map(|t| t.0));
        Ok(Self {
            requests,
            allocator: Allocator::default()
                .method(opt.method)
                .optimal_solver(solver)
                .completion(opt.completion),
            csv: opt.csv,
            stats: opt.stats,
        })
    }
}

impl AllocationConfig {
    fn run(self) -> eyre::Result<()> {
        log::info!("Solving {} request(s)", self.requests.len());
        let results = self.allocator.allocate_all(&self.requests);
        let stdout = io::stdout();
        let mut out = stdout.lock();
        let mut rejected = 0;
        for (idx, result) in results.iter().enumerate() {
            let allocation = match result {
                Ok(allocation) => allocation,
                Err(err) => {
                    log::error!("Request {} rejected: {}", idx, err);
                    rejected += 1;
                    continue;
                }
            };
            serde_json::to_writer(&mut out, &allocation.response)
                .wrap_err("unable to write response")?;
            writeln!(out)?;
            if self.stats {
                eprint!("{}", allocation.response.stats);
            }
            if let Some(path) = &self.csv {
                let path = csv_path(path, idx, results.len());
                let file = File::create(&path)
                    .wrap_err_with(|| format!("unable to create {}", path.display()))?;
                allocation
                    .write_csv(file)
                    .wrap_err_with(|| format!("unable to write {}", path.display()))?;
            }
        }
        if rejected > 0 {
            Err(eyre!("{} of {} requests rejected", rejected, results.len()))
        } else {
            Ok(())
        }
    }
}

/// Reads whitespace-separated JSON requests.
fn read_requests(path: &Path) -> eyre::Result<Vec<AllocationRequest>> {
    let file = File::open(path).wrap_err("unable to read input")?;
    serde_json::Deserializer::from_reader(BufReader::new(file))
        .into_iter::<AllocationRequest>()
        .collect::<Result<Vec<_>, _>>()
        .wrap_err("unable to parse input")
}

/// Returns `path` for a single request, or `path` with `index` inserted before the extension.
fn csv_path(path: &Path, index: usize, count: usize) -> PathBuf {
    if count == 1 {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map_or_else(|| "allocation".into(), |s| s.to_string_lossy());
    let name = match path.extension() {
        Some(ext) => format!("{}.{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}.{}", stem, index),
    };
    path.with_file_name(name)
}

fn set_up_logger(opt: &Opt) -> Result<(), fern::InitError> {
    let log_level = match opt.verbose {
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        3 => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(log_level);
    let dispatch = if let Some(path) = &opt.log_output {
        let _ = std::fs::remove_file(path);
        dispatch.chain(
            std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .append(false)
                .open(path)?,
        )
    } else {
        dispatch
    };
    let dispatch = if opt.no_stderr {
        dispatch
    } else {
        dispatch.chain(std::io::stderr())
    };
    dispatch.apply()?;
    Ok(())
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let opt = Opt::from_args();
    set_up_logger(&opt)?;
    let conf = AllocationConfig::try_from(opt)?;
    conf.run()
}

#[cfg(test)]
mod test {
    use super::*;

    const REQUEST: &str = r#"{
        "resources": [{"id": "R1", "name": "CPU", "capacity": 8, "cost": 1}],
        "projects": [
            {"id": "P1", "name": "Search", "requirements": {"R1": 6}, "priority": 2},
            {"id": "P2", "name": "Index", "requirements": {"R1": 4}, "priority": 1}
        ],
        "method": "optimal"
    }"#;

    fn opt(args: &[&str]) -> Opt {
        Opt::from_iter(std::iter::once("allocate").chain(args.iter().copied()))
    }

    fn input(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_single_request() {
        let file = input(REQUEST);
        let requests = read_requests(file.path()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Optimal);
        assert_eq!(requests[0].projects.len(), 2);
    }

    #[test]
    fn test_read_batch() {
        let single_line = REQUEST.replace('\n', " ");
        let file = input(&format!("{}\n{}\n{{}}\n", single_line, single_line));
        let requests = read_requests(file.path()).unwrap();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[2], AllocationRequest::default());
    }

    #[test]
    fn test_read_invalid() {
        let file = input("{\"resources\": 7}");
        let err = read_requests(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("unable to parse input"));
    }

    #[test]
    fn test_options() {
        let opt = opt(&[
            "--input",
            "requests.json",
            "--method",
            "greedy",
            "--engine",
            "cbc",
            "--timeout",
            "1s 500ms",
            "--completion",
            "average",
            "-vv",
        ]);
        assert_eq!(opt.method, Some(Method::Greedy));
        assert_eq!(opt.engine, EngineOption::Cbc);
        assert_eq!(opt.timeout.unwrap().0, Duration::from_millis(1500));
        assert_eq!(opt.completion, CompletionMethod::Average);
        assert_eq!(opt.verbose, 2);
        assert!(!opt.continuous);
    }

    #[test]
    fn test_invalid_timeout() {
        let result = Opt::from_iter_safe(&["allocate", "--input", "x", "--timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config() {
        let file = input(REQUEST);
        let path = file.path().to_string_lossy().to_string();
        let conf = AllocationConfig::try_from(opt(&["--input", &path, "--continuous"])).unwrap();
        assert_eq!(conf.requests.len(), 1);
        let allocation = conf.allocator.allocate(&conf.requests[0]).unwrap();
        assert_eq!(allocation.response.stats.total_used, 8);
    }

    #[test]
    fn test_run_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let file = input(&format!("{}\n{}", REQUEST.replace('\n', " "), REQUEST));
        let input_path = file.path().to_string_lossy().to_string();
        let csv = dir.path().join("table.csv");
        let csv_arg = csv.to_string_lossy().to_string();
        let conf =
            AllocationConfig::try_from(opt(&["--input", &input_path, "--csv", &csv_arg])).unwrap();
        conf.run().unwrap();
        for idx in 0..2 {
            let content =
                std::fs::read_to_string(dir.path().join(format!("table.{}.csv", idx))).unwrap();
            assert_eq!(
                content,
                "Resource,Index,Search,Row Sum\nR1,2,6,8\nColumn Sum,2,6,8\n"
            );
        }
    }

    #[test]
    fn test_run_reports_rejected() {
        let file = input(r#"{"resources": [{"id": "", "capacity": 1}]}"#);
        let path = file.path().to_string_lossy().to_string();
        let conf = AllocationConfig::try_from(opt(&["--input", &path])).unwrap();
        let err = conf.run().unwrap_err();
        assert_eq!(err.to_string(), "1 of 1 requests rejected");
    }

    #[test]
    fn test_csv_path() {
        let path = Path::new("out/table.csv");
        assert_eq!(csv_path(path, 3, 1), PathBuf::from("out/table.csv"));
        assert_eq!(csv_path(path, 3, 5), PathBuf::from("out/table.3.csv"));
        assert_eq!(
            csv_path(Path::new("table"), 0, 2),
            PathBuf::from("table.0")
        );
    }
}
