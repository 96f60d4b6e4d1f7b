//! Execution layer - status transitions, dependency resolution, schedule
//! membership and time progression.

#![warn(missing_docs)]

pub mod error;
pub mod transition;
pub mod dependency;
pub mod scheduler;
pub mod engine;

pub use error::{EngineError, Result};
pub use transition::{next_status, ScheduleTransition};
pub use dependency::{DependencyGraph, DependencyResolver, ResolutionSummary};
pub use scheduler::{CapacityLoad, ScheduleManager};
pub use engine::{
    AdvanceResult, BatchAdvance, EngineConfig, OverflowWarning, SimulationResult,
    TimeProgressionEngine,
};
