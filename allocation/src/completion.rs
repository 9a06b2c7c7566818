//! Completion metrics: how well an assignment satisfies a project's requirements.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Chunk, Project, ResourceId};

/// Computes the completion percentage of a project given the chunks granted to it.
///
/// Implementations must be deterministic, side-effect free, and return a value in `[0, 100]`.
/// Only requirements with a positive quantity are taken into account; a project without any
/// is complete by definition.
pub trait CompletionPolicy: Send + Sync {
    /// Returns the completion percentage of `project` granted `chunks`.
    fn completion(&self, project: &Project, chunks: &[Chunk]) -> f64;
}

/// Requirement-weighted completion.
///
/// Each resource contributes `min(assigned, required)` out of `required`, so larger
/// requirements weigh more and over-fulfillment never pushes the result above 100.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedCompletion;

/// Unweighted mean of per-resource fulfillment ratios, each capped at 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct AverageCompletion;

/// Selects one of the built-in completion policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CompletionMethod {
    /// See [`WeightedCompletion`].
    Weighted,
    /// See [`AverageCompletion`].
    Average,
}

impl Default for CompletionMethod {
    fn default() -> Self {
        Self::Weighted
    }
}

impl CompletionMethod {
    /// Returns the shared policy implementing this method.
    #[must_use]
    pub fn policy(self) -> Arc<dyn CompletionPolicy> {
        match self {
            Self::Weighted => Arc::new(WeightedCompletion),
            Self::Average => Arc::new(AverageCompletion),
        }
    }
}

fn assigned_per_resource(chunks: &[Chunk]) -> BTreeMap<&ResourceId, u64> {
    let mut assigned = BTreeMap::new();
    for chunk in chunks {
        let total = assigned.entry(&chunk.resource_id).or_insert(0_u64);
        *total = total.saturating_add(chunk.quantity);
    }
    assigned
}

/// Pairs of `(satisfied, required)` for every positive requirement, where `satisfied` is capped
/// at `required`.
fn fulfillment<'a>(
    project: &'a Project,
    chunks: &'a [Chunk],
) -> impl Iterator<Item = (u64, u64)> + 'a {
    let assigned = assigned_per_resource(chunks);
    project
        .requirements()
        .iter()
        .filter(|(_, required)| **required > 0)
        .map(move |(resource, &required)| {
            let granted = assigned.get(resource).copied().unwrap_or(0);
            (granted.min(required), required)
        })
}

impl CompletionPolicy for WeightedCompletion {
    fn completion(&self, project: &Project, chunks: &[Chunk]) -> f64 {
        let (satisfied, required) = fulfillment(project, chunks)
            .fold((0.0, 0.0), |(s, r), (satisfied, required)| {
                (s + satisfied as f64, r + required as f64)
            });
        if required > 0.0 {
            satisfied / required * 100.0
        } else {
            100.0
        }
    }
}

impl CompletionPolicy for AverageCompletion {
    fn completion(&self, project: &Project, chunks: &[Chunk]) -> f64 {
        let (sum, count) = fulfillment(project, chunks)
            .fold((0.0, 0_usize), |(sum, count), (satisfied, required)| {
                (sum + satisfied as f64 / required as f64, count + 1)
            });
        if count > 0 {
            sum / count as f64 * 100.0
        } else {
            100.0
        }
    }
}
