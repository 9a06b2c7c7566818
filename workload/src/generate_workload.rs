//! Generates a synthetic allocation request and prints it as JSON.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

use std::io::Write;

use allocation::{AllocationRequest, Criterion, Direction, Method, Strategy};
use anyhow::Context;
use structopt::StructOpt;
use workload::{CapacityDistribution, ProjectGenerator, RequirementProfile, ResourceGenerator};

/// Generates a synthetic allocation request and prints it as JSON.
#[derive(Debug, StructOpt)]
struct Opt {
    #[structopt(long, default_value = "100")]
    /// Number of resources.
    resources: usize,

    #[structopt(long, default_value = "10")]
    /// Smallest resource capacity.
    min_capacity: u64,

    #[structopt(long, default_value = "100")]
    /// Largest resource capacity.
    max_capacity: u64,

    #[structopt(long, default_value = "uniform")]
    /// Capacity distribution: uniform, normal, pareto, exponential, or clustered.
    distribution: CapacityDistribution,

    #[structopt(long, use_delimiter = true, default_value = "20,50,80")]
    /// Capacity levels of the clustered distribution.
    clusters: Vec<u64>,

    #[structopt(long, default_value = "5")]
    /// Number of projects.
    projects: usize,

    #[structopt(long, default_value = "balanced")]
    /// Requirement profile: balanced, sparse, complementary, competitive, or seasonal.
    profile: RequirementProfile,

    #[structopt(long, default_value = "0.7")]
    /// Fraction of each capacity that requirements are scaled to.
    utilization_target: f64,

    #[structopt(long, default_value = "greedy")]
    /// Solver named in the request: greedy or optimal.
    method: Method,

    #[structopt(long)]
    /// Greedy criterion, e.g., BY_TOTAL_SIZE.
    criterion: Option<Criterion>,

    #[structopt(long, default_value = "SMALLEST_FIRST")]
    /// Greedy direction: LARGEST_FIRST or SMALLEST_FIRST.
    direction: Direction,

    #[structopt(short, long, default_value = "42")]
    /// Random seed.
    seed: u64,

    #[structopt(long, default_value = "1")]
    /// Number of requests; each one is printed on its own line, with consecutive seeds.
    count: usize,
}

fn request(opt: &Opt, seed: u64) -> anyhow::Result<AllocationRequest> {
    let resources = ResourceGenerator::default()
        .num_resources(opt.resources)
        .min_capacity(opt.min_capacity)
        .max_capacity(opt.max_capacity)
        .distribution(opt.distribution)
        .clusters(opt.clusters.clone())
        .seed(seed)
        .generate()
        .context("cannot generate resources")?;
    let projects = ProjectGenerator::default()
        .num_projects(opt.projects)
        .resources(resources.clone())
        .profile(opt.profile)
        .utilization_target(opt.utilization_target)
        .seed(seed)
        .generate()
        .context("cannot generate projects")?;
    let request = AllocationRequest::new(&resources, &projects).method(opt.method);
    Ok(match opt.criterion {
        Some(criterion) => request.strategy(Strategy::new(criterion, opt.direction)),
        None => request,
    })
}

fn run(opt: &Opt) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut writer = stdout.lock();
    for seed in (opt.seed..).take(opt.count) {
        serde_json::to_writer(&mut writer, &request(opt, seed)?)?;
        writeln!(writer)?;
    }
    Ok(())
}

fn main() {
    if let Err(err) = run(&Opt::from_args()) {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}
