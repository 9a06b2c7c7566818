use allocation::Resource;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;
use rand_distr::{Distribution, Exp, Normal, Pareto};

use crate::{GeneratorError, Result};

const PARETO_SHAPE: f64 = 1.16;
const CLUSTER_SPREAD: f64 = 0.2;

/// Shape of the generated capacities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CapacityDistribution {
    /// Even distribution over the capacity range.
    Uniform,
    /// Gaussian around the middle of the range, with 99.7% of the mass inside it.
    Normal,
    /// Power law: few large capacities, many small ones.
    Pareto,
    /// Exponentially decreasing capacities.
    Exponential,
    /// Capacities close to a few fixed levels.
    Clustered,
}

impl Default for CapacityDistribution {
    fn default() -> Self {
        Self::Uniform
    }
}

/// Generates resources with IDs `res0`, `res1`, and so on.
///
/// The cost of resource `i` is its capacity modulo `i + 1`.
///
/// ```
/// # use workload::{CapacityDistribution, ResourceGenerator};
/// let resources = ResourceGenerator::default()
///     .num_resources(3)
///     .distribution(CapacityDistribution::Normal)
///     .generate()
///     .unwrap();
/// assert_eq!(resources.len(), 3);
/// assert_eq!(resources[2].id().as_str(), "res2");
/// ```
#[derive(Debug, Clone)]
pub struct ResourceGenerator {
    num_resources: usize,
    min_capacity: u64,
    max_capacity: u64,
    distribution: CapacityDistribution,
    seed: u64,
    clusters: Vec<u64>,
}

impl Default for ResourceGenerator {
    fn default() -> Self {
        Self {
            num_resources: 100,
            min_capacity: 10,
            max_capacity: 100,
            distribution: CapacityDistribution::default(),
            seed: 42,
            clusters: vec![20, 50, 80],
        }
    }
}

impl ResourceGenerator {
    /// Number of resources to generate.
    #[must_use]
    pub fn num_resources(mut self, num_resources: usize) -> Self {
        self.num_resources = num_resources;
        self
    }

    /// Smallest capacity.
    #[must_use]
    pub fn min_capacity(mut self, min_capacity: u64) -> Self {
        self.min_capacity = min_capacity;
        self
    }

    /// Largest capacity.
    #[must_use]
    pub fn max_capacity(mut self, max_capacity: u64) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    /// Capacity distribution.
    #[must_use]
    pub fn distribution(mut self, distribution: CapacityDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    /// Random seed.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Capacity levels for [`CapacityDistribution::Clustered`].
    #[must_use]
    pub fn clusters(mut self, clusters: Vec<u64>) -> Self {
        self.clusters = clusters;
        self
    }

    /// Generates the resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the capacity range is empty, if Pareto capacities are requested with
    /// a zero minimum, or if clustered capacities are requested without clusters.
    pub fn generate(&self) -> Result<Vec<Resource>> {
        let sampler = self.sampler()?;
        let mut rng = ChaChaRng::seed_from_u64(self.seed);
        Ok((0..self.num_resources)
            .map(|i| {
                let capacity = sampler.sample(&mut rng);
                Resource::new(
                    format!("res{}", i),
                    format!("Resource{}", i),
                    capacity,
                    capacity % (i as u64 + 1),
                )
            })
            .collect())
    }

    fn sampler(&self) -> Result<CapacitySampler<'_>> {
        let (min, max) = (self.min_capacity, self.max_capacity);
        if min > max {
            return Err(GeneratorError::InvalidRange { min, max });
        }
        let kind = match self.distribution {
            _ if min == max => SamplerKind::Constant,
            CapacityDistribution::Uniform => SamplerKind::Uniform,
            CapacityDistribution::Normal => SamplerKind::Normal(
                Normal::new((min as f64 + max as f64) / 2.0, (max - min) as f64 / 6.0)
                    .map_err(distribution_error)?,
            ),
            CapacityDistribution::Pareto => SamplerKind::Pareto(
                Pareto::new(min as f64, PARETO_SHAPE).map_err(distribution_error)?,
            ),
            CapacityDistribution::Exponential => SamplerKind::Exponential(
                Exp::new(4.0 / (max - min) as f64).map_err(distribution_error)?,
            ),
            CapacityDistribution::Clustered if self.clusters.is_empty() => {
                return Err(GeneratorError::NoClusters)
            }
            CapacityDistribution::Clustered => SamplerKind::Clustered(&self.clusters),
        };
        Ok(CapacitySampler { min, max, kind })
    }
}

fn distribution_error(err: impl std::fmt::Display) -> GeneratorError {
    GeneratorError::Distribution(err.to_string())
}

enum SamplerKind<'a> {
    Constant,
    Uniform,
    Normal(Normal<f64>),
    Pareto(Pareto<f64>),
    Exponential(Exp<f64>),
    Clustered(&'a [u64]),
}

struct CapacitySampler<'a> {
    min: u64,
    max: u64,
    kind: SamplerKind<'a>,
}

impl CapacitySampler<'_> {
    fn sample<R: Rng>(&self, rng: &mut R) -> u64 {
        let (min, max) = (self.min, self.max);
        match &self.kind {
            SamplerKind::Constant => min,
            SamplerKind::Uniform => rng.gen_range(min..=max),
            SamplerKind::Normal(normal) => loop {
                let capacity = normal.sample(rng).round();
                if capacity >= min as f64 && capacity <= max as f64 {
                    break capacity as u64;
                }
            },
            SamplerKind::Pareto(pareto) => loop {
                let capacity = pareto.sample(rng) as u64;
                if capacity <= max {
                    break capacity;
                }
            },
            SamplerKind::Exponential(exp) => {
                min.saturating_add(exp.sample(rng) as u64).min(max)
            }
            SamplerKind::Clustered(clusters) => {
                let cluster = clusters[rng.gen_range(0..clusters.len())];
                let variation = (cluster as f64 * CLUSTER_SPREAD) as u64;
                let offset = rng.gen_range(0..=variation.saturating_mul(2));
                cluster
                    .saturating_add(offset)
                    .saturating_sub(variation)
                    .max(min)
                    .min(max)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    const ALL: [CapacityDistribution; 5] = [
        CapacityDistribution::Uniform,
        CapacityDistribution::Normal,
        CapacityDistribution::Pareto,
        CapacityDistribution::Exponential,
        CapacityDistribution::Clustered,
    ];

    #[test]
    fn test_defaults() {
        let resources = ResourceGenerator::default().generate().unwrap();
        assert_eq!(resources.len(), 100);
        for (i, resource) in resources.iter().enumerate() {
            assert_eq!(resource.id().as_str(), format!("res{}", i));
            assert_eq!(resource.name(), format!("Resource{}", i));
            assert!((10..=100).contains(&resource.available_capacity()));
            assert_eq!(
                resource.cost(),
                resource.available_capacity() % (i as u64 + 1)
            );
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        for &distribution in &ALL {
            let generator = ResourceGenerator::default()
                .distribution(distribution)
                .seed(17);
            assert_eq!(generator.generate().unwrap(), generator.generate().unwrap());
        }
    }

    #[test]
    fn test_single_value_range() {
        for &distribution in &ALL {
            let resources = ResourceGenerator::default()
                .num_resources(10)
                .min_capacity(7)
                .max_capacity(7)
                .distribution(distribution)
                .generate()
                .unwrap();
            assert!(resources.iter().all(|r| r.available_capacity() == 7));
        }
    }

    #[test]
    fn test_clusters() {
        let resources = ResourceGenerator::default()
            .distribution(CapacityDistribution::Clustered)
            .clusters(vec![50])
            .generate()
            .unwrap();
        assert!(resources
            .iter()
            .all(|r| (40..=60).contains(&r.available_capacity())));
    }

    #[test]
    fn test_full_range() {
        for &distribution in &[CapacityDistribution::Normal, CapacityDistribution::Clustered] {
            let resources = ResourceGenerator::default()
                .num_resources(20)
                .min_capacity(1)
                .max_capacity(u64::MAX)
                .distribution(distribution)
                .clusters(vec![u64::MAX])
                .generate()
                .unwrap();
            assert_eq!(resources.len(), 20);
            assert!(resources.iter().all(|r| r.available_capacity() >= 1));
        }
    }

    #[test]
    fn test_invalid_configurations() {
        assert_eq!(
            ResourceGenerator::default()
                .min_capacity(5)
                .max_capacity(4)
                .generate(),
            Err(GeneratorError::InvalidRange { min: 5, max: 4 })
        );
        assert_eq!(
            ResourceGenerator::default()
                .distribution(CapacityDistribution::Clustered)
                .clusters(vec![])
                .generate(),
            Err(GeneratorError::NoClusters)
        );
        assert!(matches!(
            ResourceGenerator::default()
                .min_capacity(0)
                .distribution(CapacityDistribution::Pareto)
                .generate(),
            Err(GeneratorError::Distribution(_))
        ));
    }

    #[test]
    fn test_distribution_from_str() {
        use std::str::FromStr;
        assert_eq!(
            CapacityDistribution::from_str("pareto").unwrap(),
            CapacityDistribution::Pareto
        );
        assert_eq!(CapacityDistribution::Exponential.to_string(), "exponential");
    }

    proptest! {
        #[test]
        fn test_capacities_within_range(
            seed: u64,
            min in 1..50_u64,
            width in 0..100_u64,
            idx in 0..5_usize,
        ) {
            let max = min + width;
            let resources = ResourceGenerator::default()
                .num_resources(20)
                .min_capacity(min)
                .max_capacity(max)
                .distribution(ALL[idx])
                .seed(seed)
                .generate()
                .unwrap();
            for resource in resources {
                prop_assert!(resource.available_capacity() <= max);
                prop_assert!(resource.available_capacity() >= min);
            }
        }
    }
}
