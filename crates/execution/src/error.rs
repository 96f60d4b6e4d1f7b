//! Errors raised by the execution layer.

use dbr_core::{
    BufferOverflowError, DependencyError, ScheduleId, ScheduleValidationError, WorkItemId,
    WorkItemStatus,
};
use dbr_storage::StorageError;

/// Result alias for execution operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while scheduling or advancing boards.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Storage failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Schedule failed explicit validation
    #[error(transparent)]
    Validation(#[from] ScheduleValidationError),

    /// Guarded advance rejected; nothing was committed
    #[error(transparent)]
    Overflow(#[from] BufferOverflowError),

    /// Dependency edge rejected
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// Referenced entity does not exist in the tenant scope
    #[error("Not found: {0}")]
    NotFound(String),

    /// Only Ready items can be placed into a schedule
    #[error("work item {item} is {status}; only ready items can be scheduled")]
    ItemNotReady {
        item: WorkItemId,
        status: WorkItemStatus,
    },

    /// The item already belongs to another schedule
    #[error("work item {item} already belongs to schedule {schedule}")]
    AlreadyScheduled {
        item: WorkItemId,
        schedule: ScheduleId,
    },

    /// Membership is frozen once a schedule leaves planning
    #[error("schedule {0} has been released; membership can no longer change")]
    ScheduleReleased(ScheduleId),
}
