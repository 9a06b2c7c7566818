use std::convert::TryFrom;
use std::f64::consts::PI;

use allocation::{Project, Resource, ResourceId};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::{jitter, GeneratorError, Result};

/// How project requirements are spread over resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum RequirementProfile {
    /// Every project needs a similar share of every resource.
    Balanced,
    /// Every project needs a few resources, drawn at random.
    Sparse,
    /// Projects mostly need disjoint groups of resources.
    Complementary,
    /// All projects compete for the same third of the resources.
    Competitive,
    /// Requirements follow a sine wave across resources, shifted for each project.
    Seasonal,
}

impl Default for RequirementProfile {
    fn default() -> Self {
        Self::Balanced
    }
}

/// Generates projects with IDs `proj0`, `proj1`, and so on, with requirements keyed by the IDs
/// of the given resources.
///
/// Requirements are derived from resource capacities scaled by the utilization target. Project
/// `i` has priority `i`, except for the seasonal profile, where it is `i % 9`.
#[derive(Debug, Clone)]
pub struct ProjectGenerator {
    num_projects: usize,
    resources: Vec<Resource>,
    profile: RequirementProfile,
    utilization_target: f64,
    seed: u64,
}

impl Default for ProjectGenerator {
    fn default() -> Self {
        Self {
            num_projects: 5,
            resources: Vec::new(),
            profile: RequirementProfile::default(),
            utilization_target: 0.7,
            seed: 42,
        }
    }
}

impl ProjectGenerator {
    /// Number of projects to generate.
    #[must_use]
    pub fn num_projects(mut self, num_projects: usize) -> Self {
        self.num_projects = num_projects;
        self
    }

    /// Resources the projects draw from.
    #[must_use]
    pub fn resources(mut self, resources: Vec<Resource>) -> Self {
        self.resources = resources;
        self
    }

    /// Requirement profile.
    #[must_use]
    pub fn profile(mut self, profile: RequirementProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Fraction of each capacity the requirements are scaled to.
    #[must_use]
    pub fn utilization_target(mut self, utilization_target: f64) -> Self {
        self.utilization_target = utilization_target;
        self
    }

    /// Random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generates the projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the utilization target is negative or not finite.
    pub fn generate(&self) -> Result<Vec<Project>> {
        let target = self.utilization_target;
        if !target.is_finite() || target < 0.0 {
            return Err(GeneratorError::InvalidTarget(target));
        }
        let mut rng = ChaChaRng::seed_from_u64(self.seed);
        let requirements = match self.profile {
            RequirementProfile::Balanced => self.balanced(&mut rng),
            RequirementProfile::Sparse => self.sparse(&mut rng),
            RequirementProfile::Complementary => self.complementary(&mut rng),
            RequirementProfile::Competitive => self.competitive(&mut rng),
            RequirementProfile::Seasonal => self.seasonal(&mut rng),
        };
        Ok(requirements
            .into_iter()
            .enumerate()
            .map(|(i, requirements)| {
                let priority = if self.profile == RequirementProfile::Seasonal {
                    i % 9
                } else {
                    i
                };
                Project::new(
                    format!("proj{}", i),
                    format!("Project{}", i),
                    requirements,
                    i64::try_from(priority).unwrap_or(i64::MAX),
                )
            })
            .collect())
    }

    /// `capacity * target * factor`, truncated.
    fn scaled(&self, resource: &Resource, factor: f64) -> u64 {
        (resource.available_capacity() as f64 * self.utilization_target * factor) as u64
    }

    /// Requirement of `base` plus up to half of it at random, saturating at `u64::MAX`.
    fn jittered(rng: &mut ChaChaRng, resource: &Resource, base: u64) -> (ResourceId, u64) {
        (
            resource.id().clone(),
            base.saturating_add(jitter(rng, base / 2)),
        )
    }

    fn balanced(&self, rng: &mut ChaChaRng) -> Vec<Vec<(ResourceId, u64)>> {
        let share = 1.0 / self.num_projects.max(1) as f64;
        (0..self.num_projects)
            .map(|_| {
                self.resources
                    .iter()
                    .map(|r| Self::jittered(rng, r, self.scaled(r, share)))
                    .collect()
            })
            .collect()
    }

    fn sparse(&self, rng: &mut ChaChaRng) -> Vec<Vec<(ResourceId, u64)>> {
        let num_required = (self.resources.len() / 5).max(1);
        (0..self.num_projects)
            .map(|_| {
                let mut shuffled: Vec<_> = self.resources.iter().collect();
                shuffled.shuffle(rng);
                shuffled
                    .into_iter()
                    .take(num_required)
                    .map(|r| Self::jittered(rng, r, self.scaled(r, 1.0)))
                    .collect()
            })
            .collect()
    }

    fn complementary(&self, rng: &mut ChaChaRng) -> Vec<Vec<(ResourceId, u64)>> {
        let group_size = (self.resources.len() / self.num_projects.max(1)).max(1);
        let num_groups = (self.resources.len() + group_size - 1) / group_size;
        (0..self.num_projects)
            .map(|i| {
                let group = if num_groups == 0 { 0 } else { i % num_groups };
                let primary = group * group_size..(group + 1) * group_size;
                let (inside, outside): (Vec<_>, Vec<_>) = self
                    .resources
                    .iter()
                    .enumerate()
                    .partition(|(j, _)| primary.contains(j));
                let mut requirements: Vec<_> = inside
                    .into_iter()
                    .map(|(_, r)| Self::jittered(rng, r, self.scaled(r, 1.0)))
                    .collect();
                requirements.extend(
                    outside
                        .into_iter()
                        .map(|(_, r)| (r.id().clone(), jitter(rng, self.scaled(r, 0.2)))),
                );
                requirements
            })
            .collect()
    }

    fn competitive(&self, rng: &mut ChaChaRng) -> Vec<Vec<(ResourceId, u64)>> {
        let num_contested = (self.resources.len() / 3).max(1);
        let share = 1.0 / self.num_projects.max(1) as f64;
        (0..self.num_projects)
            .map(|_| {
                self.resources
                    .iter()
                    .enumerate()
                    .map(|(j, r)| {
                        if j < num_contested {
                            Self::jittered(rng, r, self.scaled(r, 1.0))
                        } else {
                            (r.id().clone(), jitter(rng, self.scaled(r, share)))
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn seasonal(&self, rng: &mut ChaChaRng) -> Vec<Vec<(ResourceId, u64)>> {
        let len = self.resources.len();
        let season = (len / 4).max(1) as f64;
        let pattern: Vec<f64> = (0..len)
            .map(|j| 0.5 + 0.5 * (2.0 * PI * j as f64 / season).sin())
            .collect();
        (0..self.num_projects)
            .map(|i| {
                self.resources
                    .iter()
                    .enumerate()
                    .map(|(j, r)| {
                        let factor = pattern[(i + j) % len];
                        Self::jittered(rng, r, self.scaled(r, factor))
                    })
                    .collect()
            })
            .collect()
    }
}
