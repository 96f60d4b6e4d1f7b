//! DBR core data models.
//!
//! This crate defines the entities a Drum-Buffer-Rope board is made of:
//! the capacity constrained resource, the board layout around it, the
//! schedules travelling across it, and the work items and dependency edges
//! they carry.

#![warn(missing_docs)]

// Core identities
mod id;

// Board layout
mod resource;
mod board;
mod position;

// Work
mod schedule;
mod work_item;
mod dependency;

mod error;

// Re-exports
pub use id::*;

pub use resource::{CapacityResource, TimeUnit};
pub use board::BoardConfiguration;
pub use position::{BufferPosition, BufferSide, Zone};
pub use schedule::{Schedule, ScheduleStatus};
pub use work_item::{WorkItem, WorkItemStatus};
pub use dependency::{Dependency, DependencyKind};
pub use error::{BufferOverflowError, DependencyError, ScheduleValidationError};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
