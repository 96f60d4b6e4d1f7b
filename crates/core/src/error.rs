//! Error taxonomy of the scheduling core.

use crate::id::{BoardId, ScheduleId, TenantId, WorkItemId};
use crate::work_item::WorkItemStatus;

/// Raised by explicit schedule validation. Never auto-corrected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleValidationError {
    /// A member work item is not in the Ready state
    #[error("schedule {schedule}: work item {item} is {status}, expected ready")]
    NotReady {
        schedule: ScheduleId,
        item: WorkItemId,
        status: WorkItemStatus,
    },

    /// A member id has no matching work item
    #[error("schedule {schedule}: work item {item} is missing")]
    MissingItem {
        schedule: ScheduleId,
        item: WorkItemId,
    },

    /// Required hours exceed the resource's capacity per time unit
    #[error(
        "schedule {schedule}: requires {required:.2}h on '{resource}' but capacity is {capacity:.2}h"
    )]
    CapacityExceeded {
        schedule: ScheduleId,
        resource: String,
        required: f64,
        capacity: f64,
    },
}

/// A guarded advance would fill the pre-constraint buffer.
///
/// The advance that raised it committed nothing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, thiserror::Error)]
#[error(
    "board {board}: advance would put {projected_occupancy} schedules into a pre-constraint buffer of {capacity}"
)]
pub struct BufferOverflowError {
    pub board: BoardId,
    pub projected_occupancy: usize,
    pub capacity: u32,
}

/// Rejected dependency edges. The edge is never added.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// The edge would close a cycle (self-edges included)
    #[error("circular dependency: {dependent} -> {prerequisite} closes cycle {cycle:?}")]
    Circular {
        dependent: WorkItemId,
        prerequisite: WorkItemId,
        cycle: Vec<WorkItemId>,
    },

    /// The endpoints belong to different tenants
    #[error(
        "cross-scope dependency: {dependent} belongs to '{dependent_tenant}' but {prerequisite} belongs to '{prerequisite_tenant}'"
    )]
    CrossScope {
        dependent: WorkItemId,
        dependent_tenant: TenantId,
        prerequisite: WorkItemId,
        prerequisite_tenant: TenantId,
    },

    /// An endpoint does not exist
    #[error("unknown work item: {0}")]
    UnknownItem(WorkItemId),
}
