//! Seeded generators of synthetic allocation workloads.
//!
//! [`ResourceGenerator`] draws resource capacities from one of several [`CapacityDistribution`]s
//! and [`ProjectGenerator`] derives project requirements from those capacities following a
//! [`RequirementProfile`]. The same configuration and seed always produce the same workload.

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

use rand::Rng;

mod projects;
mod resources;

pub use projects::{ProjectGenerator, RequirementProfile};
pub use resources::{CapacityDistribution, ResourceGenerator};

/// Invalid generator configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeneratorError {
    /// The capacity range is empty.
    #[error("Minimum capacity {min} exceeds maximum capacity {max}")]
    InvalidRange {
        /// Minimum capacity.
        min: u64,
        /// Maximum capacity.
        max: u64,
    },
    /// Clustered capacities requested without any cluster.
    #[error("At least one cluster is required")]
    NoClusters,
    /// Utilization target is negative or not finite.
    #[error("Invalid utilization target: {0}")]
    InvalidTarget(f64),
    /// A distribution rejected its parameters.
    #[error("Invalid distribution parameters: {0}")]
    Distribution(String),
}

/// Result alias using [`GeneratorError`].
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Uniform sample from `[0, n)`, or 0 if `n == 0`.
fn jitter<R: Rng>(rng: &mut R, n: u64) -> u64 {
    if n == 0 {
        0
    } else {
        rng.gen_range(0..n)
    }
}
