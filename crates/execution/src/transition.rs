//! Schedule status transition table.
//!
//! Kept apart from the Schedule entity: the engine classifies the new
//! position and asks this table which status it implies.

use dbr_core::{BufferPosition, ScheduleId, ScheduleStatus, Zone};
use serde::{Deserialize, Serialize};

/// Status implied by moving to `position` while in `current`.
///
/// | current        | new zone                   | next            |
/// |----------------|----------------------------|-----------------|
/// | Completed      | any                        | Completed       |
/// | any            | beyond post bound          | Completed       |
/// | Planning       | pre-constraint, constraint | PreConstraint   |
/// | Planning, Pre  | post-constraint            | PostConstraint  |
/// | other          | other                      | unchanged       |
///
/// Reaching the CCR slot is not a status of its own; a planning schedule
/// that lands there directly (zero-size pre buffer) counts as released.
pub fn next_status(current: ScheduleStatus, position: &BufferPosition) -> ScheduleStatus {
    use ScheduleStatus::*;

    if current == Completed || position.is_past_post_bound() {
        return Completed;
    }

    match (current, position.zone()) {
        (Planning, Zone::PreConstraint | Zone::Constraint) => PreConstraint,
        (Planning | PreConstraint, Zone::PostConstraint) => PostConstraint,
        (status, _) => status,
    }
}

/// One schedule's move during a unit advance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleTransition {
    /// The schedule
    pub schedule_id: ScheduleId,
    /// Status before the advance
    pub old_status: ScheduleStatus,
    /// Status after the advance
    pub new_status: ScheduleStatus,
    /// Position before the advance
    pub old_position: i64,
    /// Position after the advance
    pub new_position: i64,
    /// Zone the new position was classified into
    pub zone: Zone,
}

impl ScheduleTransition {
    /// Whether the status changed.
    pub fn status_changed(&self) -> bool {
        self.old_status != self.new_status
    }
}
