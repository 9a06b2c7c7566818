//! Test utilities shared by the allocation crates: fixed scenarios, `proptest` strategies
//! generating adversarial problems, and checks of the invariants every assignment must satisfy.

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

use std::collections::BTreeMap;

use allocation::{Assignment, Criterion, Direction, Project, Resource, ResourceId, ResourcePool};
use proptest::prelude::*;

/// Number of distinct resource IDs used by the strategies; small, so that records repeat IDs.
pub const NUM_RESOURCE_IDS: usize = 5;

fn resource_id(idx: usize) -> String {
    format!("R{}", idx)
}

/// Two resources, `R1 = 8` and `R2 = 5`, and two projects: `P1 {R1: 6, R2: 5}` with priority 2
/// and `P2 {R1: 4}` with priority 1. The greedy result depends on the processing order.
#[must_use]
pub fn order_sensitive_problem() -> (Vec<Resource>, Vec<Project>) {
    (
        vec![
            Resource::new("R1", "CPU", 8, 1),
            Resource::new("R2", "GPU", 5, 3),
        ],
        vec![
            Project::new("P1", "Search", vec![("R1", 6), ("R2", 5)], 2),
            Project::new("P2", "Index", vec![("R1", 4)], 1),
        ],
    )
}

/// `R1 = 8` shared by `P1 {R1: 6}` with priority 2 and `P2 {R1: 4}` with priority 1.
/// The optimal objective is 22.
#[must_use]
pub fn priority_weighted_problem() -> (Vec<Resource>, Vec<Project>) {
    (
        vec![Resource::new("R1", "CPU", 8, 1)],
        vec![
            Project::new("P1", "Search", vec![("R1", 6)], 2),
            Project::new("P2", "Index", vec![("R1", 4)], 1),
        ],
    )
}

/// Resource records with repeating IDs and possibly zero capacity.
pub fn resources() -> impl Strategy<Value = Vec<Resource>> {
    prop::collection::vec((0..NUM_RESOURCE_IDS, 0..20_u64, 0..5_u64), 0..8).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(idx, (id, capacity, cost))| {
                Resource::new(resource_id(id), format!("Resource{}", idx), capacity, cost)
            })
            .collect()
    })
}

/// Projects with unique IDs whose requirements may be zero or name unknown resources.
pub fn projects() -> impl Strategy<Value = Vec<Project>> {
    let requirements = prop::collection::vec((0..=NUM_RESOURCE_IDS, 0..15_u64), 0..4);
    prop::collection::vec((requirements, -2..5_i64), 0..6).prop_map(|records| {
        records
            .into_iter()
            .enumerate()
            .map(|(idx, (requirements, priority))| {
                Project::new(
                    format!("P{}", idx),
                    format!("Project{}", idx),
                    requirements
                        .into_iter()
                        .map(|(id, quantity)| (resource_id(id), quantity)),
                    priority,
                )
            })
            .collect()
    })
}

/// Resources together with projects competing for them.
pub fn problem() -> impl Strategy<Value = (Vec<Resource>, Vec<Project>)> {
    (resources(), projects())
}

/// Any greedy ranking strategy.
pub fn greedy_strategy() -> impl Strategy<Value = allocation::Strategy> {
    let criterion = prop_oneof![
        Just(Criterion::ByTotalSize),
        Just(Criterion::ByPriority),
        Just(Criterion::ByCreationOrder),
        Just(Criterion::None),
    ];
    let direction = prop_oneof![Just(Direction::LargestFirst), Just(Direction::SmallestFirst)];
    (criterion, direction)
        .prop_map(|(criterion, direction)| allocation::Strategy::new(criterion, direction))
}

/// Asserts that no resource is allocated beyond its aggregated capacity.
pub fn assert_capacity_bound(resources: &[Resource], assignment: &Assignment) {
    let pool = ResourcePool::aggregate(resources);
    for (resource, allocated) in assignment.allocated_per_resource() {
        assert!(
            allocated <= pool.capacity(&resource),
            "{} allocated {} of {}",
            resource,
            allocated,
            pool.capacity(&resource)
        );
    }
}

/// Asserts that no project receives more of a resource than it requires, and that every listed
/// project received at least one unit.
pub fn assert_requirement_bound(projects: &[Project], assignment: &Assignment) {
    for allocation in assignment {
        let project = projects
            .iter()
            .find(|p| p.id() == allocation.project_id())
            .expect("assignment lists an unknown project");
        assert!(allocation.chunks().iter().all(|c| c.quantity > 0));
        let mut granted: BTreeMap<&ResourceId, u64> = BTreeMap::new();
        for chunk in allocation.chunks() {
            *granted.entry(&chunk.resource_id).or_default() += chunk.quantity;
        }
        for (resource, quantity) in granted {
            assert!(
                quantity <= project.required(resource),
                "{} received {} of {} but requires {}",
                project.id(),
                quantity,
                resource,
                project.required(resource)
            );
        }
    }
}

/// Asserts that completion rates lie in `[0, 100]` and reach 100 for fully served projects.
pub fn assert_completion_bounds(projects: &[Project], assignment: &Assignment) {
    for allocation in assignment {
        let completion = allocation.completion();
        assert!((0.0..=100.0).contains(&completion), "{}", completion);
        let project = projects
            .iter()
            .find(|p| p.id() == allocation.project_id())
            .expect("assignment lists an unknown project");
        let fully_served = project
            .requirements()
            .iter()
            .all(|(resource, &required)| allocation.allocated(resource) >= required);
        if fully_served {
            assert!((completion - 100.0).abs() < 1e-9, "{}", completion);
        }
    }
}

/// Runs all invariant checks.
pub fn assert_valid(resources: &[Resource], projects: &[Project], assignment: &Assignment) {
    assert_capacity_bound(resources, assignment);
    assert_requirement_bound(projects, assignment);
    assert_completion_bounds(projects, assignment);
}
