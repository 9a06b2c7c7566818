use std::collections::BTreeMap;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Resource ID.
///
/// Several [`Resource`] records can share one ID; their capacities are summed before solving.
#[derive(
    From, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Clone, Hash, Display,
)]
#[serde(transparent)]
pub struct ResourceId(String);

/// Project ID.
#[derive(
    From, Debug, PartialEq, PartialOrd, Eq, Ord, Serialize, Deserialize, Clone, Hash, Display,
)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ResourceId {
    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl ProjectId {
    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A capacity-bounded, costed pool of units contributed by a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: ResourceId,
    name: String,
    available_capacity: u64,
    cost: u64,
}

impl Resource {
    /// Constructs a resource record.
    pub fn new<I, N>(id: I, name: N, available_capacity: u64, cost: u64) -> Self
    where
        I: Into<ResourceId>,
        N: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            available_capacity,
            cost,
        }
    }

    /// Resource ID.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of units this record contributes.
    #[must_use]
    pub fn available_capacity(&self) -> u64 {
        self.available_capacity
    }

    /// Cost per unit.
    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }
}

/// A demand for resources.
///
/// Requirements are kept sorted by resource ID, which fixes the order in which solvers visit
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    id: ProjectId,
    name: String,
    requirements: BTreeMap<ResourceId, u64>,
    priority: i64,
}

impl Project {
    /// Constructs a project. If a resource ID repeats in `requirements`, the last quantity wins.
    pub fn new<I, N, R, Q>(id: I, name: N, requirements: Q, priority: i64) -> Self
    where
        I: Into<ProjectId>,
        N: Into<String>,
        R: Into<ResourceId>,
        Q: IntoIterator<Item = (R, u64)>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            requirements: requirements
                .into_iter()
                .map(|(resource, quantity)| (resource.into(), quantity))
                .collect(),
            priority,
        }
    }

    /// Project ID.
    #[must_use]
    pub fn id(&self) -> &ProjectId {
        &self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Required quantities by resource ID.
    #[must_use]
    pub fn requirements(&self) -> &BTreeMap<ResourceId, u64> {
        &self.requirements
    }

    /// Required quantity of `resource`, 0 if not required.
    #[must_use]
    pub fn required(&self, resource: &ResourceId) -> u64 {
        self.requirements.get(resource).copied().unwrap_or(0)
    }

    /// Project priority; the meaning of the value depends on the solver.
    #[must_use]
    pub fn priority(&self) -> i64 {
        self.priority
    }

    /// Sum of all required quantities.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.requirements
            .values()
            .fold(0_u64, |acc, &q| acc.saturating_add(q))
    }

    /// Utility of a single allocated unit: `1 + max(priority, 0)`.
    ///
    /// Negative priorities carry no penalty.
    #[must_use]
    pub fn utility_weight(&self) -> u64 {
        1 + self.priority.max(0) as u64
    }
}

/// A quantity of one resource granted to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Allocated resource.
    pub resource_id: ResourceId,
    /// Number of allocated units.
    pub quantity: u64,
    /// Cost per unit of the allocated resource.
    pub unit_cost: u64,
}

impl Chunk {
    /// Constructs a new chunk.
    #[must_use]
    pub fn new(resource_id: ResourceId, quantity: u64, unit_cost: u64) -> Self {
        Self {
            resource_id,
            quantity,
            unit_cost,
        }
    }
}

/// Resources granted to a single project together with its completion rate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAllocation {
    project_id: ProjectId,
    chunks: Vec<Chunk>,
    completion: f64,
}

impl ProjectAllocation {
    pub(crate) fn new(project_id: ProjectId, chunks: Vec<Chunk>, completion: f64) -> Self {
        Self {
            project_id,
            chunks,
            completion,
        }
    }

    /// ID of the project.
    #[must_use]
    pub fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    /// Granted chunks in ascending resource ID order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Completion percentage in `[0, 100]`.
    #[must_use]
    pub fn completion(&self) -> f64 {
        self.completion
    }

    /// Units of `resource` granted to the project.
    #[must_use]
    pub fn allocated(&self, resource: &ResourceId) -> u64 {
        self.chunks
            .iter()
            .filter(|c| &c.resource_id == resource)
            .fold(0_u64, |acc, c| acc.saturating_add(c.quantity))
    }

    /// Total number of granted units across all resources, saturating at `u64::MAX`.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.chunks
            .iter()
            .fold(0_u64, |acc, c| acc.saturating_add(c.quantity))
    }
}

/// Result of a single solve.
///
/// Allocations are stored in the order the solver produced them. Projects that were granted
/// nothing are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Assignment {
    allocations: Vec<ProjectAllocation>,
}

impl Assignment {
    pub(crate) fn push(&mut self, allocation: ProjectAllocation) {
        self.allocations.push(allocation);
    }

    /// Returns `true` if no project received anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Number of projects that received at least one unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    /// Iterates over project allocations.
    pub fn iter(&self) -> impl Iterator<Item = &ProjectAllocation> {
        self.allocations.iter()
    }

    /// Allocation of the project with the given ID.
    #[must_use]
    pub fn get(&self, project: &ProjectId) -> Option<&ProjectAllocation> {
        self.allocations.iter().find(|a| &a.project_id == project)
    }

    /// Completion rate of the project with the given ID, if it received anything.
    #[must_use]
    pub fn completion(&self, project: &ProjectId) -> Option<f64> {
        self.get(project).map(ProjectAllocation::completion)
    }

    /// Total allocated units per resource.
    #[must_use]
    pub fn allocated_per_resource(&self) -> BTreeMap<ResourceId, u64> {
        let mut totals = BTreeMap::new();
        for chunk in self.allocations.iter().flat_map(|a| a.chunks.iter()) {
            let total = totals.entry(chunk.resource_id.clone()).or_insert(0_u64);
            *total = total.saturating_add(chunk.quantity);
        }
        totals
    }

    /// Total allocated units across all projects and resources, saturating at `u64::MAX`.
    #[must_use]
    pub fn total_allocated(&self) -> u64 {
        self.allocations
            .iter()
            .map(ProjectAllocation::total_units)
            .fold(0, u64::saturating_add)
    }
}

impl<'a> IntoIterator for &'a Assignment {
    type Item = &'a ProjectAllocation;
    type IntoIter = std::slice::Iter<'a, ProjectAllocation>;
    fn into_iter(self) -> Self::IntoIter {
        self.allocations.iter()
    }
}
