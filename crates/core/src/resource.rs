//! Capacity resource model - the bottleneck every board is paced by.

use serde::{Deserialize, Serialize};
use crate::id::{ResourceId, TenantId};
use crate::work_item::WorkItem;

/// Unit of time a resource's capacity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Day,
    Week,
    Month,
}

impl TimeUnit {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Month => "month",
        }
    }
}

/// A capacity constrained resource (CCR).
///
/// Work items reference the resource by `name` in their required-hours map,
/// so demand is always computed against that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityResource {
    /// Unique identifier
    pub id: ResourceId,

    /// Owning tenant
    pub tenant: TenantId,

    /// Resource name, the key used in work item hour maps
    pub name: String,

    /// Hours available per time unit (>0 when active)
    pub capacity_per_time_unit: f64,

    /// Time unit the capacity is expressed in
    pub time_unit: TimeUnit,

    /// Whether the resource is in use
    pub active: bool,
}

impl CapacityResource {
    /// Create a new active resource.
    pub fn new(
        tenant: TenantId,
        name: impl Into<String>,
        capacity_per_time_unit: f64,
        time_unit: TimeUnit,
    ) -> Self {
        Self {
            id: ResourceId::new(),
            tenant,
            name: name.into(),
            capacity_per_time_unit,
            time_unit,
            active: true,
        }
    }

    /// Sum of this resource's required hours across the given items.
    pub fn compute_total_demand<'a, I>(&self, items: I) -> f64
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        items
            .into_iter()
            .map(|item| item.hours_for(&self.name))
            .sum()
    }

    /// Demand divided by capacity. Zero capacity reports zero utilization.
    pub fn compute_utilization<'a, I>(&self, items: I) -> f64
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        if self.capacity_per_time_unit <= 0.0 {
            return 0.0;
        }
        self.compute_total_demand(items) / self.capacity_per_time_unit
    }

    /// Capacity left after the given demand; negative when overbooked.
    pub fn compute_available_capacity<'a, I>(&self, items: I) -> f64
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        self.capacity_per_time_unit - self.compute_total_demand(items)
    }

    /// Whether the items fit within one time unit of capacity.
    pub fn can_accommodate<'a, I>(&self, items: I) -> bool
    where
        I: IntoIterator<Item = &'a WorkItem>,
    {
        self.compute_available_capacity(items) >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(hours: &[(&str, f64)]) -> WorkItem {
        let mut item = WorkItem::new(TenantId::new("t1"), "item");
        for (name, h) in hours {
            item.required_hours.insert(name.to_string(), *h);
        }
        item
    }

    fn resource(capacity: f64) -> CapacityResource {
        CapacityResource::new(TenantId::new("t1"), "review", capacity, TimeUnit::Week)
    }

    #[test]
    fn test_demand_only_counts_own_hours() {
        let items = vec![
            item(&[("review", 4.0), ("design", 10.0)]),
            item(&[("review", 6.0)]),
            item(&[("design", 3.0)]),
        ];
        assert_eq!(resource(40.0).compute_total_demand(&items), 10.0);
    }

    #[test]
    fn test_utilization_and_available() {
        let items = vec![item(&[("review", 30.0)])];
        let r = resource(40.0);
        assert!((r.compute_utilization(&items) - 0.75).abs() < f64::EPSILON);
        assert_eq!(r.compute_available_capacity(&items), 10.0);
        assert!(r.can_accommodate(&items));
    }

    #[test]
    fn test_overbooked_resource() {
        let items = vec![item(&[("review", 30.0)]), item(&[("review", 15.0)])];
        let r = resource(40.0);
        assert_eq!(r.compute_available_capacity(&items), -5.0);
        assert!(!r.can_accommodate(&items));
    }

    #[test]
    fn test_exact_fit_is_accommodated() {
        let items = vec![item(&[("review", 40.0)])];
        assert!(resource(40.0).can_accommodate(&items));
    }

    #[test]
    fn test_zero_capacity_utilization() {
        let items = vec![item(&[("review", 5.0)])];
        assert_eq!(resource(0.0).compute_utilization(&items), 0.0);
    }
}
