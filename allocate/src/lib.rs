//! Solves allocation requests and reports on the results.
//!
//! An [`Allocator`] validates an [`AllocationRequest`](allocation::AllocationRequest), runs the
//! requested solver, and builds an [`AllocationResponse`] carrying per-project allocations and
//! [`AllocationStats`]. Assignments can also be exported as CSV tables with [`write_csv`].

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
    clippy::cast_precision_loss
)]
#![deny(unsafe_code)]

mod export;
mod response;
mod service;
mod stats;

pub use export::write_csv;
pub use response::{AllocationResponse, ProjectResponse, ResourceAllocation, Status};
pub use service::{Allocation, Allocator};
pub use stats::{AllocationStats, ProjectStats, ResourceUsage, UsageCount};

/// Error type encompassing all errors of this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Request rejected or solver failure.
    #[error(transparent)]
    Allocation(#[from] allocation::Error),
    /// Failure to write a CSV table.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using [`Error`](enum.Error.html).
pub type Result<T> = std::result::Result<T, Error>;
