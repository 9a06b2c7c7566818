use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Assignment, Chunk, CompletionPolicy, Project, ProjectAllocation, ResourceId, ResourcePool,
    WeightedCompletion,
};

/// The key projects are ranked by before the greedy pass.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Criterion {
    /// Sum of all required quantities.
    ByTotalSize,
    /// Project priority.
    ByPriority,
    /// Projects carry no creation time, so this keeps the input order, same as [`None`].
    ///
    /// [`None`]: Criterion::None
    ByCreationOrder,
    /// Keep the input order.
    None,
}

/// Whether projects with the largest or the smallest key go first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// Descending order.
    LargestFirst,
    /// Ascending order.
    SmallestFirst,
}

/// Project ordering used by the [`GreedySolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Strategy {
    /// Ranking key.
    pub criterion: Criterion,
    /// Ranking direction.
    pub direction: Direction,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            criterion: Criterion::None,
            direction: Direction::SmallestFirst,
        }
    }
}

impl Strategy {
    /// Constructs a strategy.
    #[must_use]
    pub fn new(criterion: Criterion, direction: Direction) -> Self {
        Self {
            criterion,
            direction,
        }
    }

    fn key(self, project: &Project) -> i128 {
        match self.criterion {
            Criterion::ByTotalSize => i128::from(project.total_size()),
            Criterion::ByPriority => i128::from(project.priority()),
            Criterion::ByCreationOrder | Criterion::None => 0,
        }
    }

    /// Returns projects in processing order. The sort is stable: ties keep their input order.
    pub(crate) fn rank<'p>(self, projects: &'p [Project]) -> Vec<&'p Project> {
        let mut ranked: Vec<_> = projects.iter().collect();
        match self.direction {
            Direction::SmallestFirst => ranked.sort_by_key(|p| self.key(p)),
            Direction::LargestFirst => ranked.sort_by_key(|p| Reverse(self.key(p))),
        }
        ranked
    }
}

/// Single-pass, first-come-first-served allocator.
///
/// Projects are processed in the order given by the [`Strategy`]. Each one takes as much of
/// every required resource as is still available, up to its requirement; allocations of
/// earlier projects are never revisited.
#[derive(Clone)]
pub struct GreedySolver {
    strategy: Strategy,
    completion: Arc<dyn CompletionPolicy>,
}

impl Default for GreedySolver {
    fn default() -> Self {
        Self::new(Strategy::default())
    }
}

impl std::fmt::Debug for GreedySolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreedySolver")
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl GreedySolver {
    /// Constructs a solver with the canonical [`WeightedCompletion`] metric.
    #[must_use]
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            completion: Arc::new(WeightedCompletion),
        }
    }

    /// Replaces the completion policy.
    #[must_use]
    pub fn completion(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.completion = policy;
        self
    }

    /// Ranking strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Assigns the resources in `pool` to `projects`.
    ///
    /// Projects that receive nothing are left out of the result.
    #[must_use]
    pub fn solve(&self, pool: &ResourcePool, projects: &[Project]) -> Assignment {
        let mut remaining = pool.capacities().clone();
        let mut assignment = Assignment::default();
        for project in self.strategy.rank(projects) {
            let chunks = take_resources(project, &mut remaining, pool);
            if chunks.is_empty() {
                log::debug!("Project {} received nothing", project.id());
                continue;
            }
            let completion = self.completion.completion(project, &chunks);
            log::debug!(
                "Project {} received {} chunk(s), {:.2}% complete",
                project.id(),
                chunks.len(),
                completion
            );
            assignment.push(ProjectAllocation::new(
                project.id().clone(),
                chunks,
                completion,
            ));
        }
        log::info!(
            "Greedy pass ({} {}) served {} of {} projects",
            self.strategy.criterion,
            self.strategy.direction,
            assignment.len(),
            projects.len()
        );
        assignment
    }
}

/// Takes what is left of each resource `project` requires, in ascending resource ID order.
fn take_resources(
    project: &Project,
    remaining: &mut BTreeMap<ResourceId, u64>,
    pool: &ResourcePool,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for (resource, &required) in project.requirements() {
        if required == 0 {
            continue;
        }
        let available = match remaining.get(resource) {
            Some(&available) if available > 0 => available,
            _ => continue,
        };
        let quantity = required.min(available);
        if quantity == available {
            remaining.remove(resource);
        } else if let Some(left) = remaining.get_mut(resource) {
            *left -= quantity;
        }
        chunks.push(Chunk::new(
            resource.clone(),
            quantity,
            pool.unit_cost(resource),
        ));
    }
    chunks
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{AverageCompletion, Resource};
    use approx::assert_abs_diff_eq;
    use std::str::FromStr;

    fn two_projects() -> (ResourcePool, Vec<Project>) {
        let resources = vec![Resource::new("R1", "", 8, 0), Resource::new("R2", "", 5, 0)];
        let projects = vec![
            Project::new("P1", "", vec![("R1", 6), ("R2", 5)], 2),
            Project::new("P2", "", vec![("R1", 4)], 1),
        ];
        (ResourcePool::aggregate(&resources), projects)
    }

    fn allocated(assignment: &Assignment, project: &str, resource: &str) -> u64 {
        assignment
            .get(&project.into())
            .map_or(0, |a| a.allocated(&resource.into()))
    }

    #[test]
    fn test_smallest_first_by_size() {
        let (pool, projects) = two_projects();
        let solver = GreedySolver::new(Strategy::new(
            Criterion::ByTotalSize,
            Direction::SmallestFirst,
        ));
        let assignment = solver.solve(&pool, &projects);
        let order: Vec<_> = assignment.iter().map(|a| a.project_id().as_str()).collect();
        assert_eq!(order, vec!["P2", "P1"]);
        assert_eq!(allocated(&assignment, "P2", "R1"), 4);
        assert_eq!(allocated(&assignment, "P1", "R1"), 4);
        assert_eq!(allocated(&assignment, "P1", "R2"), 5);
        assert_eq!(assignment.completion(&"P2".into()), Some(100.0));
        assert_abs_diff_eq!(
            assignment.completion(&"P1".into()).unwrap(),
            81.818,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_largest_first_by_size() {
        let (pool, projects) = two_projects();
        let solver = GreedySolver::new(Strategy::new(
            Criterion::ByTotalSize,
            Direction::LargestFirst,
        ));
        let assignment = solver.solve(&pool, &projects);
        assert_eq!(allocated(&assignment, "P1", "R1"), 6);
        assert_eq!(allocated(&assignment, "P1", "R2"), 5);
        assert_eq!(allocated(&assignment, "P2", "R1"), 2);
        assert_eq!(assignment.completion(&"P1".into()), Some(100.0));
        assert_eq!(assignment.completion(&"P2".into()), Some(50.0));
    }

    #[test]
    fn test_by_priority() {
        let (pool, projects) = two_projects();
        let ascending = GreedySolver::new(Strategy::new(
            Criterion::ByPriority,
            Direction::SmallestFirst,
        ))
        .solve(&pool, &projects);
        assert_eq!(allocated(&ascending, "P2", "R1"), 4);
        assert_eq!(allocated(&ascending, "P1", "R1"), 4);

        let descending = GreedySolver::new(Strategy::new(
            Criterion::ByPriority,
            Direction::LargestFirst,
        ))
        .solve(&pool, &projects);
        assert_eq!(allocated(&descending, "P1", "R1"), 6);
        assert_eq!(allocated(&descending, "P2", "R1"), 2);
    }

    #[test]
    fn test_creation_order_keeps_input_order() {
        let (pool, projects) = two_projects();
        for &criterion in &[Criterion::ByCreationOrder, Criterion::None] {
            for &direction in &[Direction::SmallestFirst, Direction::LargestFirst] {
                let assignment =
                    GreedySolver::new(Strategy::new(criterion, direction)).solve(&pool, &projects);
                let order: Vec<_> = assignment.iter().map(|a| a.project_id().as_str()).collect();
                assert_eq!(order, vec!["P1", "P2"]);
            }
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let pool = ResourcePool::aggregate(&[Resource::new("R", "", 3, 0)]);
        let projects = vec![
            Project::new("A", "", vec![("R", 2)], 5),
            Project::new("B", "", vec![("R", 2)], 5),
        ];
        for &direction in &[Direction::SmallestFirst, Direction::LargestFirst] {
            let assignment = GreedySolver::new(Strategy::new(Criterion::ByPriority, direction))
                .solve(&pool, &projects);
            assert_eq!(allocated(&assignment, "A", "R"), 2);
            assert_eq!(allocated(&assignment, "B", "R"), 1);
        }
    }

    #[test]
    fn test_zero_capacity_yields_empty_assignment() {
        let pool = ResourcePool::aggregate(&[Resource::new("R1", "", 0, 0)]);
        let projects = vec![Project::new("P1", "", vec![("R1", 3)], 0)];
        assert!(GreedySolver::default().solve(&pool, &projects).is_empty());
    }

    #[test]
    fn test_unknown_and_zero_requirements_are_skipped() {
        let pool = ResourcePool::aggregate(&[Resource::new("R1", "", 5, 7)]);
        let projects = vec![Project::new(
            "P1",
            "",
            vec![("R0", 3), ("R1", 2), ("R2", 0)],
            0,
        )];
        let assignment = GreedySolver::default().solve(&pool, &projects);
        let chunks = assignment.get(&"P1".into()).unwrap().chunks();
        assert_eq!(chunks, &[Chunk::new("R1".into(), 2, 7)]);
        assert_abs_diff_eq!(assignment.completion(&"P1".into()).unwrap(), 40.0);
    }

    #[test]
    fn test_exhausted_resource_is_not_offered_again() {
        let pool = ResourcePool::aggregate(&[Resource::new("R1", "", 4, 0)]);
        let projects = vec![
            Project::new("P1", "", vec![("R1", 4)], 0),
            Project::new("P2", "", vec![("R1", 1)], 0),
        ];
        let assignment = GreedySolver::default().solve(&pool, &projects);
        assert_eq!(assignment.len(), 1);
        assert!(assignment.get(&"P2".into()).is_none());
    }

    #[test]
    fn test_repeated_resource_records_are_pooled() {
        let pool = ResourcePool::aggregate(&[
            Resource::new("R1", "", 2, 0),
            Resource::new("R1", "", 3, 0),
        ]);
        let projects = vec![Project::new("P1", "", vec![("R1", 5)], 0)];
        let assignment = GreedySolver::default().solve(&pool, &projects);
        assert_eq!(allocated(&assignment, "P1", "R1"), 5);
    }

    #[test]
    fn test_deterministic() {
        let (pool, projects) = two_projects();
        let solver = GreedySolver::new(Strategy::new(
            Criterion::ByTotalSize,
            Direction::SmallestFirst,
        ));
        let first = serde_json::to_string(&solver.solve(&pool, &projects)).unwrap();
        let second = serde_json::to_string(&solver.solve(&pool, &projects)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_completion_policy() {
        let (pool, projects) = two_projects();
        let assignment = GreedySolver::new(Strategy::new(
            Criterion::ByTotalSize,
            Direction::SmallestFirst,
        ))
        .completion(Arc::new(AverageCompletion))
        .solve(&pool, &projects);
        // (4/6 + 5/5) / 2
        assert_abs_diff_eq!(
            assignment.completion(&"P1".into()).unwrap(),
            83.333,
            epsilon = 1e-3
        );
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(
            Criterion::from_str("BY_TOTAL_SIZE").unwrap(),
            Criterion::ByTotalSize
        );
        assert_eq!(Criterion::from_str("NONE").unwrap(), Criterion::None);
        assert_eq!(
            Direction::from_str("LARGEST_FIRST").unwrap(),
            Direction::LargestFirst
        );
        assert!(Direction::from_str("RANDOM").is_err());
        assert_eq!(Criterion::ByCreationOrder.to_string(), "BY_CREATION_ORDER");
    }
}
