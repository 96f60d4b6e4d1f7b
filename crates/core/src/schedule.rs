//! Schedule model - a positioned bundle of work items on a DBR board.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use crate::board::BoardConfiguration;
use crate::error::ScheduleValidationError;
use crate::id::{BoardId, ScheduleId, TenantId, WorkItemId};
use crate::position::BufferPosition;
use crate::resource::CapacityResource;
use crate::work_item::WorkItem;
use crate::Time;

/// A bundle of work items travelling across a board as one unit.
///
/// The schedule owns its fields and nothing else: deciding which status a
/// new position implies is done by the execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique identifier
    pub id: ScheduleId,

    /// Owning tenant
    pub tenant: TenantId,

    /// Board this schedule travels across
    pub board_id: BoardId,

    /// Display name
    pub name: String,

    /// Member work items in rope sequence
    pub work_items: Vec<WorkItemId>,

    /// Offset from the CCR slot
    pub position: i64,

    /// Lifecycle status
    pub status: ScheduleStatus,

    /// Sum of member hours on the board's CCR
    pub total_required_capacity_hours: f64,

    /// Creation timestamp
    pub created_at: Time,

    /// When the schedule entered the pre-constraint buffer
    pub released_at: Option<Time>,

    /// When the schedule first reached the CCR slot
    pub ccr_entered_at: Option<Time>,

    /// When the schedule completed
    pub completed_at: Option<Time>,

    /// Last update timestamp
    pub updated_at: Time,
}

impl Schedule {
    /// Create a planning schedule at the board's entry position.
    pub fn new(board: &BoardConfiguration, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: ScheduleId::new(),
            tenant: board.tenant.clone(),
            board_id: board.id,
            name: name.into(),
            work_items: Vec::new(),
            position: board.entry_position(),
            status: ScheduleStatus::Planning,
            total_required_capacity_hours: 0.0,
            created_at: now,
            released_at: None,
            ccr_entered_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Place the schedule at an explicit offset.
    pub fn with_position(mut self, position: i64) -> Self {
        self.position = position;
        self
    }

    /// Set the status without stamping timestamps.
    pub fn with_status(mut self, status: ScheduleStatus) -> Self {
        self.status = status;
        self
    }

    /// Move one slot downstream.
    pub fn advance_position(&mut self) {
        self.position += 1;
    }

    /// Classify the current position against a board.
    pub fn buffer_position(&self, board: &BoardConfiguration) -> BufferPosition {
        board.classify(self.position)
    }

    /// Whether the schedule still takes part in advances.
    pub fn is_active(&self) -> bool {
        self.status != ScheduleStatus::Completed
    }

    /// Add a member, adding its hours on `resource` to the total.
    ///
    /// Returns false (and changes nothing) when the item is already a member.
    pub fn add_work_item(&mut self, item: &WorkItem, resource: &str) -> bool {
        if self.work_items.contains(&item.id) {
            return false;
        }
        self.work_items.push(item.id);
        self.total_required_capacity_hours += item.hours_for(resource);
        self.updated_at = chrono::Utc::now();
        true
    }

    /// Remove a member, subtracting its hours on `resource` from the total.
    ///
    /// Returns false when the item is not a member.
    pub fn remove_work_item(&mut self, item: &WorkItem, resource: &str) -> bool {
        let Some(index) = self.work_items.iter().position(|id| *id == item.id) else {
            return false;
        };
        self.work_items.remove(index);
        if self.work_items.is_empty() {
            self.total_required_capacity_hours = 0.0;
        } else {
            self.total_required_capacity_hours =
                (self.total_required_capacity_hours - item.hours_for(resource)).max(0.0);
        }
        self.updated_at = chrono::Utc::now();
        true
    }

    /// Recompute the total from the current member items.
    pub fn recalculate_capacity(&mut self, items: &[WorkItem], resource: &str) {
        self.total_required_capacity_hours = items
            .iter()
            .filter(|item| self.work_items.contains(&item.id))
            .map(|item| item.hours_for(resource))
            .sum();
    }

    /// Validate membership readiness and capacity.
    ///
    /// Fails on the first member (in rope order) that is missing or not
    /// Ready, and only then on the capacity check.
    pub fn validate(
        &self,
        items: &[WorkItem],
        resource: &CapacityResource,
    ) -> Result<(), ScheduleValidationError> {
        let by_id: HashMap<WorkItemId, &WorkItem> =
            items.iter().map(|item| (item.id, item)).collect();

        let mut members = Vec::with_capacity(self.work_items.len());
        for id in &self.work_items {
            let Some(item) = by_id.get(id) else {
                return Err(ScheduleValidationError::MissingItem {
                    schedule: self.id,
                    item: *id,
                });
            };
            if !item.is_ready() {
                return Err(ScheduleValidationError::NotReady {
                    schedule: self.id,
                    item: *id,
                    status: item.status,
                });
            }
            members.push(*item);
        }

        let required = resource.compute_total_demand(members);
        if required > resource.capacity_per_time_unit {
            return Err(ScheduleValidationError::CapacityExceeded {
                schedule: self.id,
                resource: resource.name.clone(),
                required,
                capacity: resource.capacity_per_time_unit,
            });
        }

        Ok(())
    }

    /// Apply a status decided elsewhere, stamping lifecycle timestamps.
    pub fn apply_status(&mut self, status: ScheduleStatus, now: Time) {
        if status == ScheduleStatus::PreConstraint && self.released_at.is_none() {
            self.released_at = Some(now);
        }
        if status == ScheduleStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.status = status;
        self.updated_at = now;
    }

    /// Record passage through the CCR slot. Only the first passage counts.
    pub fn record_ccr_entry(&mut self, now: Time) {
        if self.ccr_entered_at.is_none() {
            self.ccr_entered_at = Some(now);
        }
    }
}

/// Lifecycle status of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Assembled but not yet released into the buffer
    Planning,
    /// Travelling through the pre-constraint buffer
    PreConstraint,
    /// Travelling through the post-constraint buffer
    PostConstraint,
    /// Finished; terminal
    Completed,
}

impl ScheduleStatus {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Planning => "planning",
            ScheduleStatus::PreConstraint => "pre_constraint",
            ScheduleStatus::PostConstraint => "post_constraint",
            ScheduleStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
