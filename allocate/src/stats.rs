use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;

use allocation::{
    Assignment, CompletionPolicy, Project, ProjectAllocation, ProjectId, Resource, ResourceId,
    ResourcePool, WeightedCompletion,
};
use serde::Serialize;

/// Usage of a single (aggregated) resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Resource ID.
    pub resource_id: ResourceId,
    /// Name of the first record with this ID.
    pub name: String,
    /// Pooled capacity.
    pub capacity: u64,
    /// Units assigned to projects.
    pub used: u64,
    /// Units left over.
    pub available: u64,
    /// Unit cost of the first record with this ID.
    pub cost: u64,
    /// Percentage of the capacity in use; 0 for zero-capacity resources.
    pub utilization: f64,
}

/// Number of units assigned from one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageCount {
    /// Resource ID.
    pub resource_id: ResourceId,
    /// Assigned units.
    pub units: u64,
}

/// How well one requested project was served.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    /// Project ID.
    pub project_id: ProjectId,
    /// Project name.
    pub name: String,
    /// Project priority.
    pub priority: i64,
    /// Completion percentage.
    pub completion: f64,
    /// Total units assigned.
    pub assigned_units: u64,
    /// Units assigned per resource; resources granted nothing are left out.
    pub assigned: BTreeMap<ResourceId, u64>,
    /// Units still required per resource; fully served requirements are left out.
    pub missing: BTreeMap<ResourceId, u64>,
}

/// Summary of an assignment computed from the solver inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationStats {
    /// Pooled capacity of all resources.
    pub total_capacity: u64,
    /// Units assigned to projects.
    pub total_used: u64,
    /// Percentage of the total capacity in use; 0 if there is no capacity.
    pub utilization: f64,
    /// Units left over.
    pub unused: u64,
    /// Used units divided by the number of requested projects; 0 if there are none.
    pub average_units_per_project: f64,
    /// Per-resource usage in ascending ID order.
    pub resources: Vec<ResourceUsage>,
    /// Resource with the most assigned units.
    pub most_assigned: Option<UsageCount>,
    /// Resource with the fewest assigned units among those assigned anything.
    pub least_assigned: Option<UsageCount>,
    /// Per-project statistics in request order.
    pub projects: Vec<ProjectStats>,
}

impl AllocationStats {
    /// Computes the statistics of `assignment` solved over `resources` and `projects`.
    ///
    /// Projects absent from the assignment are reported with the completion of an empty grant.
    #[must_use]
    pub fn compute(resources: &[Resource], projects: &[Project], assignment: &Assignment) -> Self {
        let pool = ResourcePool::aggregate(resources);
        let used_per_resource = assignment.allocated_per_resource();
        let total_capacity = pool.total_capacity();
        let total_used = assignment.total_allocated();
        let resources = pool
            .capacities()
            .iter()
            .map(|(id, &capacity)| {
                let used = used_per_resource.get(id).copied().unwrap_or(0);
                ResourceUsage {
                    resource_id: id.clone(),
                    name: pool
                        .representative(id)
                        .map_or_else(String::new, |r| r.name().to_string()),
                    capacity,
                    used,
                    available: capacity.saturating_sub(used),
                    cost: pool.unit_cost(id),
                    utilization: percentage(used, capacity),
                }
            })
            .collect();
        let usage_count = |(id, &units): (&ResourceId, &u64)| UsageCount {
            resource_id: id.clone(),
            units,
        };
        // `min_by_key` keeps the first of equal elements, hence the smallest ID.
        let most_assigned = used_per_resource
            .iter()
            .min_by_key(|(_, &units)| Reverse(units))
            .map(usage_count);
        let least_assigned = used_per_resource
            .iter()
            .min_by_key(|(_, &units)| units)
            .map(usage_count);
        Self {
            total_capacity,
            total_used,
            utilization: percentage(total_used, total_capacity),
            unused: total_capacity.saturating_sub(total_used),
            average_units_per_project: if projects.is_empty() {
                0.0
            } else {
                total_used as f64 / projects.len() as f64
            },
            resources,
            most_assigned,
            least_assigned,
            projects: projects
                .iter()
                .map(|project| ProjectStats::compute(project, assignment))
                .collect(),
        }
    }
}

impl ProjectStats {
    fn compute(project: &Project, assignment: &Assignment) -> Self {
        let allocation = assignment.get(project.id());
        let allocated = |resource: &ResourceId| allocation.map_or(0, |a| a.allocated(resource));
        let mut assigned = BTreeMap::new();
        if let Some(allocation) = allocation {
            for chunk in allocation.chunks() {
                let units = assigned.entry(chunk.resource_id.clone()).or_insert(0_u64);
                *units = units.saturating_add(chunk.quantity);
            }
        }
        let missing = project
            .requirements()
            .iter()
            .filter_map(|(resource, &required)| {
                let missing = required.saturating_sub(allocated(resource));
                if missing > 0 {
                    Some((resource.clone(), missing))
                } else {
                    None
                }
            })
            .collect();
        Self {
            project_id: project.id().clone(),
            name: project.name().to_string(),
            priority: project.priority(),
            completion: allocation.map_or_else(
                || WeightedCompletion.completion(project, &[]),
                ProjectAllocation::completion,
            ),
            assigned_units: allocation.map_or(0, ProjectAllocation::total_units),
            assigned,
            missing,
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl fmt::Display for AllocationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total capacity:       {}", self.total_capacity)?;
        writeln!(f, "Total used:           {}", self.total_used)?;
        writeln!(f, "Unused:               {}", self.unused)?;
        writeln!(f, "Utilization:          {:.2}%", self.utilization)?;
        writeln!(
            f,
            "Units per project:    {:.2}",
            self.average_units_per_project
        )?;
        if let Some(most) = &self.most_assigned {
            writeln!(f, "Most assigned:        {} ({})", most.resource_id, most.units)?;
        }
        if let Some(least) = &self.least_assigned {
            writeln!(
                f,
                "Least assigned:       {} ({})",
                least.resource_id, least.units
            )?;
        }
        for project in &self.projects {
            writeln!(
                f,
                "{} [{}] priority {}: {:.2}% complete, {} units",
                project.project_id,
                project.name,
                project.priority,
                project.completion,
                project.assigned_units
            )?;
            for (resource, missing) in &project.missing {
                writeln!(f, "  missing {} x {}", missing, resource)?;
            }
        }
        Ok(())
    }
}
