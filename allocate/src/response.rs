use allocation::{Assignment, Method, Outcome, ProjectId, ResourceId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AllocationStats;

/// Status of a solved request.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The solver produced an assignment.
    Completed,
    /// No feasible allocation exists.
    Infeasible,
    /// No project requires anything.
    Empty,
    /// The engine failed or ran out of time.
    Aborted,
}

impl Status {
    /// Status of an optimization outcome and the reason for aborting, if any.
    #[must_use]
    pub fn of(outcome: &Outcome) -> (Self, Option<String>) {
        match outcome {
            Outcome::Optimal(_) => (Self::Completed, None),
            Outcome::Infeasible => (Self::Infeasible, None),
            Outcome::Empty => (Self::Empty, None),
            Outcome::Aborted(reason) => (Self::Aborted, Some(reason.clone())),
        }
    }
}

/// Units of a single resource granted to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAllocation {
    /// Resource ID.
    pub resource_id: ResourceId,
    /// Granted units.
    pub allocated: u64,
}

/// Resources granted to a single project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectResponse {
    /// Project ID.
    pub project_id: ProjectId,
    /// Completion percentage.
    pub completion: f64,
    /// Granted resources in ascending ID order.
    pub resources: Vec<ResourceAllocation>,
}

/// Response to an allocation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResponse {
    /// Random ID of this allocation.
    pub allocation_id: Uuid,
    /// Solver that produced the response.
    pub method: Method,
    /// Solve status.
    pub status: Status,
    /// Why the solve was aborted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Projects that were granted anything, in solver order.
    pub projects: Vec<ProjectResponse>,
    /// Statistics of the assignment.
    pub stats: AllocationStats,
}

impl AllocationResponse {
    /// Builds a response with a fresh allocation ID.
    #[must_use]
    pub fn new(
        method: Method,
        status: Status,
        reason: Option<String>,
        assignment: &Assignment,
        stats: AllocationStats,
    ) -> Self {
        let projects = assignment
            .iter()
            .map(|allocation| ProjectResponse {
                project_id: allocation.project_id().clone(),
                completion: allocation.completion(),
                resources: allocation
                    .chunks()
                    .iter()
                    .map(|chunk| ResourceAllocation {
                        resource_id: chunk.resource_id.clone(),
                        allocated: chunk.quantity,
                    })
                    .collect(),
            })
            .collect();
        Self {
            allocation_id: Uuid::new_v4(),
            method,
            status,
            reason,
            projects,
            stats,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use allocation::{solve_greedy, Project, Resource, Strategy};
    use std::str::FromStr;

    #[test]
    fn test_status_of_outcome() {
        assert_eq!(
            Status::of(&Outcome::Optimal(Assignment::default())),
            (Status::Completed, None)
        );
        assert_eq!(Status::of(&Outcome::Infeasible), (Status::Infeasible, None));
        assert_eq!(Status::of(&Outcome::Empty), (Status::Empty, None));
        assert_eq!(
            Status::of(&Outcome::Aborted(String::from("timed out"))),
            (Status::Aborted, Some(String::from("timed out")))
        );
        for outcome in &[Outcome::Infeasible, Outcome::Empty] {
            assert_eq!(Status::of(outcome).0.to_string(), outcome.label());
        }
        assert_eq!(Status::from_str("aborted").unwrap(), Status::Aborted);
    }

    #[test]
    fn test_serialize() {
        let resources = vec![Resource::new("R1", "CPU", 8, 1)];
        let projects = vec![Project::new("P1", "Search", vec![("R1", 6)], 2)];
        let assignment = solve_greedy(&resources, &projects, Strategy::default());
        let stats = AllocationStats::compute(&resources, &projects, &assignment);
        let response =
            AllocationResponse::new(Method::Greedy, Status::Completed, None, &assignment, stats);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["method"], "greedy");
        assert_eq!(json["status"], "completed");
        assert!(json.get("reason").is_none());
        assert_eq!(
            json["projects"],
            serde_json::json!([{
                "project_id": "P1",
                "completion": 100.0,
                "resources": [{"resource_id": "R1", "allocated": 6}]
            }])
        );
        assert_eq!(json["stats"]["total_used"], 6);
        let id = json["allocation_id"].as_str().unwrap();
        assert_eq!(Uuid::parse_str(id).unwrap(), response.allocation_id);
    }

    #[test]
    fn test_fresh_ids() {
        let stats = AllocationStats::compute(&[], &[], &Assignment::default());
        let response = |reason: &str| {
            AllocationResponse::new(
                Method::Optimal,
                Status::Aborted,
                Some(reason.to_string()),
                &Assignment::default(),
                stats.clone(),
            )
        };
        let (first, second) = (response("a"), response("b"));
        assert_ne!(first.allocation_id, second.allocation_id);
        assert!(first.projects.is_empty());
        assert_eq!(
            serde_json::to_value(&first).unwrap()["reason"],
            serde_json::json!("a")
        );
    }
}
