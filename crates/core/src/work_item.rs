//! Work item model - the unit of knowledge work placed into schedules.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::id::{ScheduleId, TenantId, WorkItemId};
use crate::Time;

/// A unit of work that consumes hours on one or more named resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier
    pub id: WorkItemId,

    /// Owning tenant
    pub tenant: TenantId,

    /// Short title
    pub title: String,

    /// Readiness status
    pub status: WorkItemStatus,

    /// Required hours keyed by resource name
    pub required_hours: BTreeMap<String, f64>,

    /// Schedule this item is placed in, if any
    pub schedule_id: Option<ScheduleId>,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl WorkItem {
    /// Create a new backlog item.
    pub fn new(tenant: TenantId, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: WorkItemId::new(),
            tenant,
            title: title.into(),
            status: WorkItemStatus::Backlog,
            required_hours: BTreeMap::new(),
            schedule_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the hours required on a named resource.
    pub fn with_hours(mut self, resource: impl Into<String>, hours: f64) -> Self {
        self.required_hours.insert(resource.into(), hours);
        self
    }

    /// Set the status.
    pub fn with_status(mut self, status: WorkItemStatus) -> Self {
        self.status = status;
        self
    }

    /// Hours this item needs on the named resource (0 when not listed).
    pub fn hours_for(&self, resource: &str) -> f64 {
        self.required_hours.get(resource).copied().unwrap_or(0.0)
    }

    /// Whether the item may be placed into a schedule.
    pub fn is_ready(&self) -> bool {
        self.status == WorkItemStatus::Ready
    }

    /// Change status and touch the update timestamp.
    pub fn set_status(&mut self, status: WorkItemStatus) {
        self.status = status;
        self.updated_at = chrono::Utc::now();
    }
}

/// Readiness status of a work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    /// Not yet eligible for scheduling
    Backlog,
    /// Eligible to be placed into a schedule
    Ready,
    /// Released to the board
    InProgress,
    /// Finished
    Done,
}

impl WorkItemStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Backlog => "backlog",
            WorkItemStatus::Ready => "ready",
            WorkItemStatus::InProgress => "in_progress",
            WorkItemStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for WorkItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
