//! Wire-format allocation requests and their validation.
//!
//! Requests carry signed quantities and free-form strategy names so that malformed input can be
//! reported with the path of the offending field, e.g. `projects[1].requirements.R2`, instead of
//! failing deep inside a solver.

use std::collections::{BTreeMap, HashSet};
use std::convert::TryFrom;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Criterion, Direction, Project, Resource, ResourcePool, Result, Strategy};

/// Allocation policy requested by the caller.
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
pub enum Method {
    /// [`GreedySolver`](crate::GreedySolver).
    Greedy,
    /// [`OptimalSolver`](crate::OptimalSolver).
    Optimal,
}

impl Default for Method {
    fn default() -> Self {
        Self::Greedy
    }
}

/// Reasons for rejecting a request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A quantity that must be non-negative is negative.
    #[error("{field} must be non-negative, got {value}")]
    Negative {
        /// Path of the field.
        field: String,
        /// Rejected value.
        value: i64,
    },
    /// An identifier is empty.
    #[error("{field} must not be empty")]
    EmptyId {
        /// Path of the field.
        field: String,
    },
    /// Two projects share an ID.
    #[error("{field}: duplicate project ID {id}")]
    DuplicateProject {
        /// Path of the field.
        field: String,
        /// Repeated ID.
        id: String,
    },
    /// A strategy name is not recognized.
    #[error("{field}: unknown value {value}")]
    UnknownVariant {
        /// Path of the field.
        field: String,
        /// Rejected value.
        value: String,
    },
}

/// Resource record as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Resource ID; may repeat across records.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Available units.
    pub capacity: i64,
    /// Cost per unit.
    #[serde(default)]
    pub cost: i64,
}

/// Project record as sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Unique project ID.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Required units per resource ID.
    #[serde(default)]
    pub requirements: BTreeMap<String, i64>,
    /// Priority; higher values weigh more in the optimal solver.
    #[serde(default)]
    pub priority: i64,
}

/// Greedy strategy by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRecord {
    /// One of `BY_TOTAL_SIZE`, `BY_PRIORITY`, `BY_CREATION_ORDER`, `NONE`.
    pub criterion: String,
    /// Either `LARGEST_FIRST` or `SMALLEST_FIRST`.
    pub direction: String,
}

/// Allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocationRequest {
    /// Resource records.
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    /// Project records.
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    /// Solver to use.
    #[serde(default)]
    pub method: Method,
    /// Greedy strategy; defaults to `NONE`, `SMALLEST_FIRST`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyRecord>,
}

/// Validated request, ready to be solved.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Resource records, possibly with repeated IDs.
    pub resources: Vec<Resource>,
    /// Projects with unique IDs.
    pub projects: Vec<Project>,
    /// Solver to use.
    pub method: Method,
    /// Greedy strategy.
    pub strategy: Strategy,
}

impl Problem {
    /// Aggregated resource pool.
    #[must_use]
    pub fn pool(&self) -> ResourcePool {
        ResourcePool::aggregate(&self.resources)
    }
}

fn non_negative(field: impl FnOnce() -> String, value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| {
        ValidationError::Negative {
            field: field(),
            value,
        }
        .into()
    })
}

fn non_empty(field: impl FnOnce() -> String, id: &str) -> Result<()> {
    if id.is_empty() {
        Err(ValidationError::EmptyId { field: field() }.into())
    } else {
        Ok(())
    }
}

fn parse_variant<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        ValidationError::UnknownVariant {
            field: field.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl AllocationRequest {
    /// Builds a request from validated entities, using the default method and strategy.
    #[must_use]
    pub fn new(resources: &[Resource], projects: &[Project]) -> Self {
        Self {
            resources: resources
                .iter()
                .map(|r| ResourceRecord {
                    id: r.id().to_string(),
                    name: r.name().to_string(),
                    capacity: saturating_i64(r.available_capacity()),
                    cost: saturating_i64(r.cost()),
                })
                .collect(),
            projects: projects
                .iter()
                .map(|p| ProjectRecord {
                    id: p.id().to_string(),
                    name: p.name().to_string(),
                    requirements: p
                        .requirements()
                        .iter()
                        .map(|(id, &q)| (id.to_string(), saturating_i64(q)))
                        .collect(),
                    priority: p.priority(),
                })
                .collect(),
            method: Method::default(),
            strategy: None,
        }
    }

    /// Sets the solver.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the greedy strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(StrategyRecord {
            criterion: strategy.criterion.to_string(),
            direction: strategy.direction.to_string(),
        });
        self
    }

    /// Checks all records and converts them into solver entities.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for negative quantities, empty IDs, repeated project IDs, and
    /// unknown strategy names.
    pub fn validate(&self) -> Result<Problem> {
        let resources = self
            .resources
            .iter()
            .enumerate()
            .map(|(idx, record)| -> Result<Resource> {
                non_empty(|| format!("resources[{}].id", idx), &record.id)?;
                let capacity =
                    non_negative(|| format!("resources[{}].capacity", idx), record.capacity)?;
                let cost = non_negative(|| format!("resources[{}].cost", idx), record.cost)?;
                Ok(Resource::new(
                    record.id.as_str(),
                    record.name.as_str(),
                    capacity,
                    cost,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::new();
        let projects = self
            .projects
            .iter()
            .enumerate()
            .map(|(idx, record)| -> Result<Project> {
                non_empty(|| format!("projects[{}].id", idx), &record.id)?;
                if !seen.insert(record.id.as_str()) {
                    return Err(ValidationError::DuplicateProject {
                        field: format!("projects[{}].id", idx),
                        id: record.id.clone(),
                    }
                    .into());
                }
                let requirements = record
                    .requirements
                    .iter()
                    .map(|(resource, &quantity)| -> Result<(&str, u64)> {
                        non_empty(|| format!("projects[{}].requirements", idx), resource)?;
                        let quantity = non_negative(
                            || format!("projects[{}].requirements.{}", idx, resource),
                            quantity,
                        )?;
                        Ok((resource.as_str(), quantity))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Project::new(
                    record.id.as_str(),
                    record.name.as_str(),
                    requirements,
                    record.priority,
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        let strategy = match &self.strategy {
            Some(record) => Strategy::new(
                parse_variant::<Criterion>("strategy.criterion", &record.criterion)?,
                parse_variant::<Direction>("strategy.direction", &record.direction)?,
            ),
            None => Strategy::default(),
        };
        Ok(Problem {
            resources,
            projects,
            method: self.method,
            strategy,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    fn sample_request() -> AllocationRequest {
        serde_json::from_str(
            r#"{
                "resources": [
                    {"id": "R1", "name": "CPU", "capacity": 8, "cost": 1},
                    {"id": "R2", "name": "GPU", "capacity": 5, "cost": 3},
                    {"id": "R1", "name": "CPU (spare)", "capacity": 2, "cost": 1}
                ],
                "projects": [
                    {"id": "P1", "name": "Search", "requirements": {"R1": 6, "R2": 5}, "priority": 2},
                    {"id": "P2", "name": "Index", "requirements": {"R1": 4}, "priority": 1}
                ],
                "method": "optimal",
                "strategy": {"criterion": "BY_PRIORITY", "direction": "LARGEST_FIRST"}
            }"#,
        )
        .unwrap()
    }

    fn validation_error(request: &AllocationRequest) -> ValidationError {
        match request.validate() {
            Err(Error::Validation(err)) => err,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate() {
        let problem = sample_request().validate().unwrap();
        assert_eq!(problem.method, Method::Optimal);
        assert_eq!(
            problem.strategy,
            Strategy::new(Criterion::ByPriority, Direction::LargestFirst)
        );
        assert_eq!(problem.resources.len(), 3);
        assert_eq!(problem.pool().capacity(&"R1".into()), 10);
        assert_eq!(problem.projects[0].required(&"R2".into()), 5);
        assert_eq!(problem.projects[1].priority(), 1);
    }

    #[test]
    fn test_defaults() {
        let request: AllocationRequest = serde_json::from_str(
            r#"{"resources": [{"id": "R1", "capacity": 1}], "projects": [{"id": "P1"}]}"#,
        )
        .unwrap();
        let problem = request.validate().unwrap();
        assert_eq!(problem.method, Method::Greedy);
        assert_eq!(problem.strategy, Strategy::default());
        assert_eq!(problem.resources[0].cost(), 0);
        assert!(problem.projects[0].requirements().is_empty());
    }

    #[test]
    fn test_negative_requirement() {
        let mut request = sample_request();
        request.projects[1].requirements.insert("R2".into(), -1);
        assert_eq!(
            validation_error(&request),
            ValidationError::Negative {
                field: "projects[1].requirements.R2".into(),
                value: -1
            }
        );
    }

    #[test]
    fn test_negative_capacity_and_cost() {
        let mut request = sample_request();
        request.resources[2].cost = -4;
        assert_eq!(
            validation_error(&request).to_string(),
            "resources[2].cost must be non-negative, got -4"
        );
        request.resources[0].capacity = -1;
        assert_eq!(
            validation_error(&request),
            ValidationError::Negative {
                field: "resources[0].capacity".into(),
                value: -1
            }
        );
    }

    #[test]
    fn test_empty_ids() {
        let mut request = sample_request();
        request.projects[0].id.clear();
        assert_eq!(
            validation_error(&request),
            ValidationError::EmptyId {
                field: "projects[0].id".into()
            }
        );
        let mut request = sample_request();
        request.resources[1].id.clear();
        assert_eq!(
            validation_error(&request),
            ValidationError::EmptyId {
                field: "resources[1].id".into()
            }
        );
    }

    #[test]
    fn test_duplicate_project() {
        let mut request = sample_request();
        request.projects[1].id = "P1".into();
        assert_eq!(
            validation_error(&request),
            ValidationError::DuplicateProject {
                field: "projects[1].id".into(),
                id: "P1".into()
            }
        );
    }

    #[test]
    fn test_unknown_strategy() {
        let mut request = sample_request();
        request.strategy = Some(StrategyRecord {
            criterion: "BY_AGE".into(),
            direction: "LARGEST_FIRST".into(),
        });
        assert_eq!(
            validation_error(&request),
            ValidationError::UnknownVariant {
                field: "strategy.criterion".into(),
                value: "BY_AGE".into()
            }
        );
    }

    #[test]
    fn test_from_entities() {
        let resources = vec![Resource::new("R1", "CPU", 8, 1)];
        let projects = vec![Project::new("P1", "Search", vec![("R1", 6)], 2)];
        let request = AllocationRequest::new(&resources, &projects)
            .method(Method::Optimal)
            .strategy(Strategy::new(Criterion::ByTotalSize, Direction::SmallestFirst));
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""criterion":"BY_TOTAL_SIZE""#));
        assert!(json.contains(r#""method":"optimal""#));
        let problem = request.validate().unwrap();
        assert_eq!(problem.resources, resources);
        assert_eq!(problem.projects, projects);
    }
}
