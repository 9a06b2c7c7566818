use std::collections::BTreeMap;
use std::iter::FromIterator;

use crate::{Resource, ResourceId};

/// Total capacity per resource ID.
///
/// Records sharing an ID are summed. The first record seen for an ID is kept as its
/// representative, which provides display metadata such as the name and unit cost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePool {
    capacities: BTreeMap<ResourceId, u64>,
    representatives: BTreeMap<ResourceId, Resource>,
}

impl ResourcePool {
    /// Aggregates resource records by ID.
    pub fn aggregate<'a, I>(resources: I) -> Self
    where
        I: IntoIterator<Item = &'a Resource>,
    {
        let mut pool = Self::default();
        for resource in resources {
            let capacity = pool.capacities.entry(resource.id().clone()).or_insert(0);
            *capacity = capacity.saturating_add(resource.available_capacity());
            pool.representatives
                .entry(resource.id().clone())
                .or_insert_with(|| resource.clone());
        }
        pool
    }

    /// Total capacity of `resource`, 0 if unknown.
    #[must_use]
    pub fn capacity(&self, resource: &ResourceId) -> u64 {
        self.capacities.get(resource).copied().unwrap_or(0)
    }

    /// Capacities sorted by resource ID.
    #[must_use]
    pub fn capacities(&self) -> &BTreeMap<ResourceId, u64> {
        &self.capacities
    }

    /// First record seen for `resource`.
    #[must_use]
    pub fn representative(&self, resource: &ResourceId) -> Option<&Resource> {
        self.representatives.get(resource)
    }

    /// Unit cost of the representative record, 0 if unknown.
    #[must_use]
    pub fn unit_cost(&self, resource: &ResourceId) -> u64 {
        self.representative(resource).map_or(0, Resource::cost)
    }

    /// Sum of all capacities.
    #[must_use]
    pub fn total_capacity(&self) -> u64 {
        self.capacities
            .values()
            .fold(0_u64, |acc, &c| acc.saturating_add(c))
    }

    /// Number of distinct resource IDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capacities.len()
    }

    /// Returns `true` if there are no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capacities.is_empty()
    }
}

impl<'a> FromIterator<&'a Resource> for ResourcePool {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = &'a Resource>,
    {
        Self::aggregate(iter)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sums_repeated_ids() {
        let resources = vec![
            Resource::new("cpu", "CPU east", 4, 2),
            Resource::new("gpu", "GPU", 1, 10),
            Resource::new("cpu", "CPU west", 6, 3),
        ];
        let pool = ResourcePool::aggregate(&resources);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.capacity(&"cpu".into()), 10);
        assert_eq!(pool.capacity(&"gpu".into()), 1);
        assert_eq!(pool.capacity(&"tpu".into()), 0);
        assert_eq!(pool.total_capacity(), 11);
    }

    #[test]
    fn test_first_record_is_representative() {
        let resources = vec![
            Resource::new("cpu", "CPU east", 4, 2),
            Resource::new("cpu", "CPU west", 6, 3),
        ];
        let pool: ResourcePool = resources.iter().collect();
        assert_eq!(
            pool.representative(&"cpu".into()).map(Resource::name),
            Some("CPU east")
        );
        assert_eq!(pool.unit_cost(&"cpu".into()), 2);
        assert_eq!(pool.unit_cost(&"tpu".into()), 0);
    }

    #[test]
    fn test_empty() {
        let pool = ResourcePool::aggregate(&[]);
        assert!(pool.is_empty());
        assert_eq!(pool.total_capacity(), 0);
    }

    #[test]
    fn test_zero_capacity_records_are_kept() {
        let pool = ResourcePool::aggregate(&[Resource::new("a", "", 0, 0)]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.capacity(&"a".into()), 0);
    }
}
